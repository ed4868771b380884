pub mod access_policy;
pub mod code;
pub mod context;
pub mod pipeline;
pub mod profile;
pub mod request;
pub mod validator;
pub mod verdict;

pub use access_policy::AccessPolicyValidator;
pub use code::AuthorizationCodeStore;
pub use context::{AuthorizationContext, Claim, Subject};
pub use pipeline::{AuthorizeOutcome, AuthorizeRequestPipeline, PipelineError};
pub use profile::{ProfileError, ProfileResolver};
pub use request::{AuthorizeError, AuthorizeParameters};
pub use validator::{AuthorizeRequestValidator, ValidationError};
pub use verdict::Verdict;
