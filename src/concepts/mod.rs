//! Domain concepts. Each one owns its collections and nothing else.

pub mod caption;
pub mod compilation;
pub mod friend;
pub mod group;
pub mod music;
pub mod photobanner;
pub mod post;
pub mod user;
pub mod vote;
pub mod websession;

pub use caption::CaptionConcept;
pub use compilation::{CompilationConcept, CompilationKey, CompilationKind};
pub use friend::FriendConcept;
pub use group::GroupConcept;
pub use music::MusicConcept;
pub use photobanner::PhotoBannerConcept;
pub use post::{PostConcept, PostOptions};
pub use user::{UserConcept, UserView};
pub use vote::VoteConcept;
pub use websession::WebSessionConcept;
