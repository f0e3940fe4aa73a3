#[derive(Debug)]
pub enum FindError {
    NotFound,
    Internal,
}

#[derive(Debug)]
pub enum CreateError {
    Exists,
    Internal,
}

mod backend_file;
pub use backend_file::*;
