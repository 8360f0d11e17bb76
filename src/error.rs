use thiserror::Error;

// ============================================================================
// ERROR TAXONOMY
// ============================================================================

#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("Credenciales SOL incompletas")]
    MissingCredentials,

    #[error("Comprobante {id} no encontrado")]
    InvoiceNotFound { id: i64 },

    #[error("El comprobante {id} ya está en proceso")]
    AlreadyProcessing { id: i64 },

    #[error("Comprobante {document_number} no registrado en el backend")]
    NotFound { document_number: String },

    #[error("Error de conexión: {message}")]
    Transport { message: String },

    #[error("La extracción de detalle falló: {reason}")]
    JobFailed { reason: String },

    #[error("Tiempo de espera agotado después de {attempts} intentos")]
    Timeout { attempts: u32 },

    #[error("{failed} de {total} comprobantes no pudieron registrarse")]
    PartialRegistration { failed: usize, total: usize },
}

impl LedgerError {
    /// Precondition failures report immediately and mutate nothing.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            LedgerError::MissingCredentials
                | LedgerError::InvoiceNotFound { .. }
                | LedgerError::AlreadyProcessing { .. }
        )
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        LedgerError::Transport {
            message: err.to_string(),
        }
    }
}
