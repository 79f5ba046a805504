mod agent;
mod approval;
mod coresignal;
mod form;
mod http;
mod notification;
mod pdf;
mod prompt;
mod trigger;
mod update;

pub use agent::AgentExecutor;
pub use approval::ApprovalExecutor;
pub use coresignal::CoresignalAgentExecutor;
pub use form::FormExecutor;
pub use http::HttpCallExecutor;
pub use notification::NotificationExecutor;
pub use pdf::PdfExecutor;
pub use prompt::PromptExecutor;
pub use trigger::TriggerExecutor;
pub use update::UpdateExecutor;
