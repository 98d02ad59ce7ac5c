use crate::enrich_extras::ScriptedModel;
use favcards::ItemKind;
use favcards::enrich::{EnrichedCard, SentenceCard, WordCard, parse_enrichment};
use spectral::assert_that;
use spectral::boolean::BooleanAssertions;

mod enrich_extras;

fn serendipity() -> EnrichedCard {
    EnrichedCard::Word(WordCard {
        english_word: "serendipity".to_owned(),
        example_sentence: "Finding this café was pure serendipity.".to_owned(),
        japanese_meaning: "思いがけない幸運".to_owned(),
        example_translation: "このカフェを見つけたのはまったくの偶然だった。".to_owned(),
    })
}

const SERENDIPITY_JSON: &str = r#"{"type": "word", "data": {"english_word": "serendipity", "example_sentence": "Finding this café was pure serendipity.", "japanese_meaning": "思いがけない幸運", "example_translation": "このカフェを見つけたのはまったくの偶然だった。"}}"#;

assert_enrichments![
    plain_word_answer:
        favorite => ("serendipity", "セレンディピティ"),
        answer => SERENDIPITY_JSON,
        card => serendipity(),
    fenced_answer:
        favorite => ("serendipity", "思いがけない幸運"),
        answer => format!("```json\n{SERENDIPITY_JSON}\n```"),
        card => serendipity(),
    think_removed_before_parsing:
        favorite => ("serendipity", "セレンディピティ"),
        answer => format!("<think>It is a single noun.</think>\n{SERENDIPITY_JSON}"),
        card => serendipity(),
    sentence_answer:
        favorite => ("駅はどこですか？", "Where is the station?"),
        answer => r#"{"type": "sentence", "data": {"english_sentence": "Where is the station?", "japanese_sentence": "駅はどこですか？"}}"#,
        card => EnrichedCard::Sentence(SentenceCard {
            english_sentence: "Where is the station?".to_owned(),
            japanese_sentence: "駅はどこですか？".to_owned(),
        }),
];

#[test]
fn kind_follows_answer_type() {
    let card = parse_enrichment(SERENDIPITY_JSON).expect("Expected a word card.");
    assert_that(&card.kind()).is_equal_to(ItemKind::Word);
}

#[test]
fn empty_answer_is_malformed() {
    assert_that(&parse_enrichment("  ").is_err()).is_true();
    assert_that(&parse_enrichment("<think>hmm</think>").is_err()).is_true();
}

#[test]
fn prose_answer_is_malformed() {
    let result = parse_enrichment("Sure! Here is the card you asked for.");
    assert_that(&result.is_err()).is_true();
}

#[test]
fn unknown_type_is_malformed() {
    let result = parse_enrichment(r#"{"type": "idiom", "data": {"english_word": "x"}}"#);
    assert_that(&result.is_err()).is_true();
}

#[test]
fn missing_field_is_malformed() {
    let result = parse_enrichment(
        r#"{"type": "sentence", "data": {"english_sentence": "Good morning."}}"#,
    );
    assert_that(&result.is_err()).is_true();
}

#[test]
fn blank_field_is_malformed() {
    let error = parse_enrichment(
        r#"{"type": "sentence", "data": {"english_sentence": "Good morning.", "japanese_sentence": " "}}"#,
    )
    .expect_err("Expected a blank field to be rejected.");
    assert_that(&error.to_string().contains("japanese_sentence")).is_true();
}

#[tokio::test]
async fn malformed_model_answer_fails_enrichment() {
    let model = ScriptedModel::answering("I cannot help with that.");
    let context = favcards::enrich::EnrichContext {
        model: &model,
        rate_limiter: None,
    };
    let item = favcards::FavoriteItem::new("text", "translation");

    let result = favcards::enrich::enrich_item(&item, &context).await;

    assert_that(&result.is_err()).is_true();
}
