mod test_engine;

pub mod utils;
