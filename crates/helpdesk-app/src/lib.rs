pub mod admin_desk;
pub mod bootstrap;
pub mod cli;
pub mod composer;
pub mod directory;
pub mod draft;
pub mod error;
pub mod intake;

pub use admin_desk::{AdminDesk, CloseOutcome};
pub use bootstrap::HelpdeskRuntime;
pub use composer::{ComposeError, ReplyComposer};
pub use directory::TicketDirectory;
pub use draft::DraftBuffer;
pub use error::{AppError, AppResult};
pub use intake::{
    FieldErrors, IntakeError, IntakeField, IntakeValidator, TicketForm, TicketIntake,
    TicketReceipt, TICKET_ID_NOTICE,
};
