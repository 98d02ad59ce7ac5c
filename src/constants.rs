pub const DATA_DIR_ENV_NAME: &str = "FAVCARDS_DATA_DIR";
pub const MODEL_API_KEY_ENV_NAME: &str = "GEMINI_API_KEY";
pub const MODEL_ENV_NAME: &str = "ENRICH_MODEL";
pub const MODEL_RPM_ENV_NAME: &str = "ENRICH_RPM";
pub const BATCH_LIMIT_ENV_NAME: &str = "BATCH_LIMIT";
pub const LOG_LEVEL_ENV_NAME: &str = "LOG_LEVEL";
pub const SELECTORS_PATH_ENV_NAME: &str = "SELECTORS_PATH";
pub const FIXTURE_PATH_ENV_NAME: &str = "FAVORITES_FIXTURE_PATH";
pub const FAVORITES_URL_ENV_NAME: &str = "FAVORITES_URL";
pub const USER_AGENT_ENV_NAME: &str = "SCRAPER_USER_AGENT";
pub const ANKICONNECT_URL_ENV_NAME: &str = "ANKICONNECT_URL";
pub const WORD_DECK_ENV_NAME: &str = "ANKI_WORD_DECK_NAME";
pub const WORD_NOTE_TYPE_ENV_NAME: &str = "ANKI_WORD_NOTE_TYPE";
pub const SENTENCE_DECK_ENV_NAME: &str = "ANKI_SENTENCE_DECK_NAME";
pub const SENTENCE_NOTE_TYPE_ENV_NAME: &str = "ANKI_SENTENCE_NOTE_TYPE";
pub const LAUNCH_COMMAND_ENV_NAME: &str = "ANKI_LAUNCH_COMMAND";
pub const QUIT_COMMAND_ENV_NAME: &str = "ANKI_QUIT_COMMAND";
pub const WARMUP_SECS_ENV_NAME: &str = "ANKI_WARMUP_SECS";
pub const RUN_INTERVAL_ENV_NAME: &str = "RUN_INTERVAL_MINUTES";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_MODEL: &str = "google://gemini-2.0-flash";
pub const DEFAULT_BATCH_LIMIT: usize = 50;
pub const DEFAULT_ANKICONNECT_URL: &str = "http://localhost:8765";
pub const DEFAULT_DECK_NAME: &str = "Default";
pub const DEFAULT_NOTE_TYPE: &str = "Basic";
pub const DEFAULT_FAVORITES_URL: &str = "https://translate.google.com/saved";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";
pub const DEFAULT_LAUNCH_COMMAND: &str = "open -a Anki";
pub const DEFAULT_QUIT_COMMAND: &str = r#"osascript -e 'quit app "Anki" saving no'"#;
pub const DEFAULT_WARMUP_SECS: u64 = 10;
pub const DEFAULT_RUN_INTERVAL_MINUTES: u64 = 60;

pub const AUTH_STATE_FILE: &str = "auth_state.json";
pub const PROCESSED_IDS_FILE: &str = "processed_ids.json";
pub const LOG_FILE: &str = "app.log";
pub const SELECTORS_FILE: &str = "selectors.json";
pub const FIXTURE_FILE: &str = "favorites_fixture.json";

pub const LOG_MAX_BYTES: u64 = 1_000_000;
pub const LOG_BACKUPS: usize = 3;

pub(crate) const ANKICONNECT_VERSION: u8 = 6;
pub(crate) const ANKICONNECT_TIMEOUT_SECS: u64 = 30;
pub(crate) const SOURCE_TIMEOUT_SECS: u64 = 60;

pub(crate) const WORD_FIELD: &str = "単語";
pub(crate) const WORD_EXAMPLE_FIELD: &str = "フレーズ";
pub(crate) const WORD_MEANING_FIELD: &str = "意味";
pub(crate) const WORD_EXAMPLE_MEANING_FIELD: &str = "フレーズの意味";
pub(crate) const WORD_AUDIO_FIELD: &str = "単語音声";
pub(crate) const WORD_EXAMPLE_AUDIO_FIELD: &str = "フレーズ音声";
pub(crate) const SENTENCE_FRONT_FIELD: &str = "Front";
pub(crate) const SENTENCE_BACK_FIELD: &str = "Back";

pub(crate) const THINK_STRIPPER: &str = r"<think>[\s\S]*</think>\s*";

pub(crate) const CODE_FENCE_STRIPPER: &str = r"^```(?:json)?\s*([\s\S]*?)\s*```$";

pub(crate) const ENRICH_PROMPT_TEMPLATE: &str = r#"
You will see an English/Japanese text saved from a translator's favorites, and its translation.

Text: {text}
Translation: {translation}

Decide whether the text is a word or phrase (not a complete sentence) or a complete sentence.
For a word or phrase give the word, a natural example sentence using it,
its Japanese meaning and the Japanese translation of the example sentence.
For a sentence give the English sentence and its Japanese translation, without extra examples.

Answer with a single JSON object and nothing else:
{"type": "word", "data": {"english_word": "...", "example_sentence": "...", "japanese_meaning": "...", "example_translation": "..."}}
or
{"type": "sentence", "data": {"english_sentence": "...", "japanese_sentence": "..."}}"#;
