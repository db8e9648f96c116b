use crate::{
    error::AppResult,
    models::{BookId, Catalog, ScoredRecommendation, UserId},
};

pub const EMPTY_MESSAGE: &str =
    "I don't have any new recommendations for you right now. Keep reading!";

/// A recommended book with the catalog details a presenter needs
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedBook {
    pub book_id: BookId,
    pub title: String,
    pub librarian_pick: bool,
    pub score: f64,
}

/// Everything handed to a presenter for one response
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationContext {
    pub user_id: UserId,
    pub books: Vec<PresentedBook>,
    /// Titles the user already read, oldest first
    pub reading_history: Vec<String>,
}

impl PresentationContext {
    /// Joins ranked recommendations with catalog rows
    ///
    /// Books missing from the catalog are shown by id.
    pub fn build(
        user_id: &UserId,
        recommendations: &[ScoredRecommendation],
        history: &[BookId],
        catalog: &Catalog,
    ) -> Self {
        let books = recommendations
            .iter()
            .map(|rec| match catalog.get(&rec.book_id) {
                Some(entry) => PresentedBook {
                    book_id: rec.book_id.clone(),
                    title: entry.title.clone(),
                    librarian_pick: entry.librarian_pick,
                    score: rec.score,
                },
                None => PresentedBook {
                    book_id: rec.book_id.clone(),
                    title: rec.book_id.to_string(),
                    librarian_pick: false,
                    score: rec.score,
                },
            })
            .collect();

        let reading_history = history
            .iter()
            .filter_map(|book_id| catalog.get(book_id).map(|entry| entry.title.clone()))
            .collect();

        Self {
            user_id: user_id.clone(),
            books,
            reading_history,
        }
    }
}

/// Turns a ranked list into display text
///
/// Implementations (an LLM client, a template) sit downstream of ranking and
/// assignment; their failures never change what was recommended or logged.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Presenter: Send + Sync {
    async fn present(&self, context: PresentationContext) -> AppResult<String>;

    /// Presenter name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Deterministic presenter, also used as the fallback text
#[derive(Debug, Clone, Default)]
pub struct TemplatePresenter;

impl TemplatePresenter {
    pub fn render(context: &PresentationContext) -> String {
        if context.books.is_empty() {
            return EMPTY_MESSAGE.to_string();
        }

        let titles: Vec<String> = context
            .books
            .iter()
            .map(|book| {
                if book.librarian_pick {
                    format!("{} (Librarian's Pick)", book.title)
                } else {
                    book.title.clone()
                }
            })
            .collect();

        format!(
            "Hi! I have some great book recommendations for you: {}. Check them out!",
            titles.join(", ")
        )
    }
}

#[async_trait::async_trait]
impl Presenter for TemplatePresenter {
    async fn present(&self, context: PresentationContext) -> AppResult<String> {
        Ok(Self::render(&context))
    }

    fn name(&self) -> &'static str {
        "template"
    }
}

/// Runs the presenter, falling back to the template text on error
pub async fn present_or_fallback(presenter: &dyn Presenter, context: PresentationContext) -> String {
    match presenter.present(context.clone()).await {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(
                presenter = presenter.name(),
                user_id = %context.user_id,
                error = %e,
                "Presenter failed, using fallback message"
            );
            TemplatePresenter::render(&context)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::store::fixtures;

    fn context_for(ids: &[&str]) -> PresentationContext {
        let recs: Vec<_> = ids
            .iter()
            .map(|id| ScoredRecommendation::new(BookId::from(*id), 1.0))
            .collect();
        let history = vec![BookId::from("b3")];
        PresentationContext::build(
            &UserId::from("u1"),
            &recs,
            &history,
            &fixtures::demo_catalog(),
        )
    }

    #[test]
    fn test_context_joins_catalog() {
        let context = context_for(&["b4", "b5", "b404"]);
        assert_eq!(context.books[0].title, "The Hidden Garden");
        assert!(context.books[0].librarian_pick);
        assert!(!context.books[1].librarian_pick);
        assert_eq!(context.books[2].title, "b404");
        assert_eq!(context.reading_history, vec!["Adventures in Space"]);
    }

    #[test]
    fn test_template_marks_picks() {
        let message = TemplatePresenter::render(&context_for(&["b4", "b5"]));
        assert_eq!(
            message,
            "Hi! I have some great book recommendations for you: \
             The Hidden Garden (Librarian's Pick), Journey to the Sea. Check them out!"
        );
    }

    #[test]
    fn test_template_empty_list() {
        assert_eq!(TemplatePresenter::render(&context_for(&[])), EMPTY_MESSAGE);
    }

    #[test]
    fn test_presenter_message_used_when_ok() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_present()
            .times(1)
            .returning(|_| Ok("Happy reading!".to_string()));
        presenter.expect_name().return_const("mock");

        let message = tokio_test::block_on(present_or_fallback(&presenter, context_for(&["b4"])));
        assert_eq!(message, "Happy reading!");
    }

    #[test]
    fn test_presenter_failure_falls_back() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_present()
            .returning(|_| Err(AppError::Presentation("model timed out".to_string())));
        presenter.expect_name().return_const("mock");

        let message = tokio_test::block_on(present_or_fallback(&presenter, context_for(&["b6"])));
        assert!(message.contains("Pirates of the Bay (Librarian's Pick)"));
    }

    #[tokio::test]
    async fn test_template_presenter_is_infallible() {
        let message = TemplatePresenter
            .present(context_for(&["b1"]))
            .await
            .unwrap();
        assert!(message.starts_with("Hi!"));
    }
}
