use crate::error::{DomError, DomErrorCode};

use super::{dom_error, DomNode, ProcessingInstruction};

impl ProcessingInstruction {
    #[must_use]
    pub fn target(&self) -> String {
        self.native().target().unwrap_or_default()
    }

    #[must_use]
    pub fn data(&self) -> String {
        self.native().data()
    }

    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` if the engine rejects the data.
    pub fn set_data(&self, data: &str) -> Result<(), DomError> {
        self.native()
            .set_data(data)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidModification, e))
    }
}
