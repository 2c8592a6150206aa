mod db;
mod sessions;
mod utils;

pub use utils::test_utils;
