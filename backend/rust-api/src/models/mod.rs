pub mod artifact;
pub mod assistant;
pub mod attempt;
pub mod material;
pub mod progress;

pub use artifact::{
    ArtifactSource, MaterialRef, Question, QuestionType, Quiz, QuizResponse, Summary,
    SummaryContent, SummaryResponse,
};
pub use assistant::{ChatRequest, ChatResponse};
pub use attempt::{GradeOutcome, QuizAttempt, SubmitQuizRequest, SubmitQuizResponse};
pub use material::{
    Material, MaterialListItem, MaterialStatus, UploadMaterialRequest, UploadMaterialResponse,
};
pub use progress::{Progress, SummaryView};
