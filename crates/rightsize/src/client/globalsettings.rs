use crate::client::output::outputs::Output;
use std::path::{Path, PathBuf};

pub struct GlobalSettings {
    config_path: Option<PathBuf>,
    printer: Box<dyn Output>,
}

impl GlobalSettings {
    pub fn new(config_path: Option<PathBuf>, printer: Box<dyn Output>) -> Self {
        GlobalSettings {
            config_path,
            printer,
        }
    }

    /// Configuration file given on the command line.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn printer(&self) -> &dyn Output {
        self.printer.as_ref()
    }
}
