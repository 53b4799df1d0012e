/// Helper utils regarding XML export
pub mod xml_utils;

#[cfg(test)]
pub mod test_utils {
    /// Route `log` output of the crate to the test output (`RUST_LOG` controls the level)
    pub fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
}
