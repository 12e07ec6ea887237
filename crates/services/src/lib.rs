//! # services
//!
//! Kashaaf use-cases. Each service owns `Arc<dyn Port>` handles and no I/O
//! of its own; the binary decides which adapters sit behind the ports.

pub mod accounts;
pub mod analysis;
pub mod feed;
pub mod live_counter;
pub mod media;
pub mod validation;

pub use accounts::{AccountService, ChangePasswordInput, SignupInput};
pub use analysis::{AnalysisResponse, AnalysisService, FeedbackInput};
pub use feed::{CommentView, FeedPostView, FeedService, LikeState, PostEdit};
pub use live_counter::{CounterSnapshot, LiveCounter};
pub use media::{AttachmentPolicy, AttachmentStaging, LimitReached, MediaService};
