mod gate;
mod state;
mod workflow;

#[allow(unused_imports)]
pub use gate::{Decision, ThresholdGate, ThresholdState};
#[allow(unused_imports)]
pub use state::{Check, PromptTicket, Session, SessionSettings};
#[allow(unused_imports)]
pub use workflow::{Proceed, Workflow, WorkflowError, WorkflowReport, WorkflowStep};
