//! Distributed algorithms building the local mesh, and the communication
//! layer they run on.

pub mod communicator;
pub mod exchange;
pub mod face_to_element;
pub mod global_ids;
pub mod halo;
pub mod incidence;
pub mod local_mesh;
pub mod node_map;
pub mod subset;
pub mod vertex_exchange;
pub mod wire;

pub use face_to_element::FaceToElement;
pub use local_mesh::{generate_local_mesh_info, generate_local_mesh_info_with_options};
