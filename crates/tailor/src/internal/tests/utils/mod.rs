pub mod config;
pub mod job;

pub fn sorted_vec<T: Ord>(mut vec: Vec<T>) -> Vec<T> {
    vec.sort();
    vec
}

#[allow(unused)]
pub fn enable_test_logging() {
    let _ = env_logger::Builder::default()
        .filter(None, log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
