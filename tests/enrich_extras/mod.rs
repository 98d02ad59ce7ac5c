use async_trait::async_trait;
use llm::{
    ToolCall,
    chat::{ChatMessage, ChatProvider, ChatResponse, Tool, Usage},
    error::LLMError,
};
use std::fmt;
use std::sync::Mutex;

/// Enriches a favorite against a scripted model answer and compares the card.
///
/// Every case also checks that the prompt carried the favorite's text and
/// translation.
#[macro_export]
macro_rules! assert_enrichments {
    (
        $(
            $case:ident :
                favorite => ($text:expr, $translation:expr),
                answer => $answer:expr,
                card => $card:expr
        ),+ $(,)?
    ) => {
        $(
            #[tokio::test]
            async fn $case() {
                let model = ScriptedModel::answering($answer);
                let favorite = favcards::FavoriteItem::new($text, $translation);
                let context = favcards::enrich::EnrichContext {
                    model: &model,
                    rate_limiter: None,
                };

                let card = favcards::enrich::enrich_item(&favorite, &context)
                    .await
                    .expect("Expected the favorite to be enriched.");

                assert_that(&card).is_equal_to($card);
                let prompt = model.only_prompt();
                assert_that(&prompt.contains(&format!("Text: {}", $text))).is_true();
                assert_that(&prompt.contains(&format!("Translation: {}", $translation))).is_true();
            }
        )+
    };
}

/// Model that answers every chat with the same text and remembers the prompts.
pub(crate) struct ScriptedModel {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// The prompt of the single request the model received.
    pub fn only_prompt(&self) -> String {
        let prompts = self.prompts.lock().expect("prompt log").clone();
        let [prompt] = <[String; 1]>::try_from(prompts).expect("Expected exactly one request.");
        prompt
    }
}

#[derive(Debug)]
struct ScriptedAnswer(String);

impl ChatResponse for ScriptedAnswer {
    fn text(&self) -> Option<String> {
        Some(self.0.clone())
    }

    fn tool_calls(&self) -> Option<Vec<ToolCall>> {
        None
    }

    fn thinking(&self) -> Option<String> {
        None
    }

    fn usage(&self) -> Option<Usage> {
        None
    }
}

impl fmt::Display for ScriptedAnswer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[async_trait]
impl ChatProvider for ScriptedModel {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError> {
        self.chat_with_tools(messages, None).await
    }

    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        let prompt = messages
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().expect("prompt log").push(prompt);

        Ok(Box::new(ScriptedAnswer(self.answer.clone())))
    }
}
