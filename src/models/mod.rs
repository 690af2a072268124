pub mod movie;
pub mod preferences;
pub mod rating;
pub mod recommendation;
pub mod session;

pub use movie::{Movie, MovieIndex};
pub use preferences::{PreferenceRecord, EMPTY_PREFERENCES_QUERY};
pub use rating::{RatedMovies, Rating, RatingValue};
pub use recommendation::{
    sort_by_score, BucketSizes, CollaborativeRecommendations, Recommendation, SplitWeights,
};
pub use session::{Session, SessionKind, SessionState, User};
