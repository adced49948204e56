use clap::Parser;

use super::*;
use crate::index::{normalize_ticker, parse_drafts, search_filter, ArticleFile};

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["stockctx"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_stats_command() {
    let cli = Cli::try_parse_from(["stockctx", "stats"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Stats)));
}

#[test]
fn search_defaults_to_news_namespace() {
    let cli = Cli::try_parse_from(["stockctx", "search", "--query", "earnings"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Search {
            ref query,
            ref namespace,
            ticker: None,
            doc_type: None,
            k: None,
        }) if query == "earnings" && namespace == "news"
    ));
}

#[test]
fn search_accepts_every_filter() {
    let cli = Cli::try_parse_from([
        "stockctx",
        "search",
        "--query",
        "guidance",
        "--namespace",
        "sentiment",
        "--ticker",
        "aapl",
        "--doc-type",
        "social_post",
        "--k",
        "3",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Search {
            ref ticker,
            ref doc_type,
            k: Some(3),
            ..
        }) if ticker.as_deref() == Some("aapl") && doc_type.as_deref() == Some("social_post")
    ));
}

#[test]
fn search_requires_a_query() {
    assert!(Cli::try_parse_from(["stockctx", "search"]).is_err());
}

#[test]
fn parses_purge_with_namespace() {
    let cli = Cli::try_parse_from([
        "stockctx",
        "purge",
        "--ticker",
        "TSLA",
        "--namespace",
        "news",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Purge {
            ref ticker,
            namespace: Some(ref ns),
        }) if ticker == "TSLA" && ns == "news"
    ));
}

#[test]
fn parses_sentiment_subcommands() {
    let cli = Cli::try_parse_from(["stockctx", "sentiment", "analyze", "--ticker", "NVDA"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sentiment {
            command: SentimentCommands::Analyze { ref ticker },
        }) if ticker == "NVDA"
    ));

    let cli = Cli::try_parse_from(["stockctx", "sentiment", "summary", "--ticker", "NVDA"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sentiment {
            command: SentimentCommands::Summary { .. },
        })
    ));
}

#[test]
fn search_filter_upper_cases_ticker() {
    let filter = search_filter("news".to_string(), Some("aapl".to_string()), None);
    assert_eq!(filter.ticker.as_deref(), Some("AAPL"));
    assert_eq!(filter.namespace, "news");
    assert!(filter.doc_type.is_none());
}

#[test]
fn purge_ticker_is_normalized_like_search() {
    assert_eq!(normalize_ticker("tsla"), "TSLA");
    assert_eq!(normalize_ticker(" brk.b "), "BRK.B");
    assert_eq!(normalize_ticker("NVDA"), "NVDA");
    let filter = search_filter("news".to_string(), Some("tsla".to_string()), None);
    assert_eq!(filter.ticker.as_deref(), Some(normalize_ticker("tsla").as_str()));
}

#[test]
fn parse_drafts_skips_blank_lines() {
    let text = r#"{"namespace":"news","external_id":"a","ticker":"AAPL","doc_type":"news_article","attributes":{},"full_text":"first"}

{"namespace":"news","external_id":"b","ticker":"AAPL","doc_type":"news_article","attributes":{"title":"t"},"full_text":"second"}
"#;
    let drafts = parse_drafts(text).unwrap();
    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[1].external_id, "b");
    assert_eq!(drafts[1].attributes["title"], "t");
}

#[test]
fn parse_drafts_names_the_bad_line() {
    let text = "{\"namespace\":\"news\",\"external_id\":\"a\",\"ticker\":\"AAPL\",\"doc_type\":\"x\",\"attributes\":{},\"full_text\":\"ok\"}\nnot json\n";
    let err = parse_drafts(text).unwrap_err();
    assert!(err.to_string().contains("line 2"), "{err}");
}

#[test]
fn article_file_accepts_list_or_envelope() {
    let list: ArticleFile =
        serde_json::from_str(r#"[{"title":"A","article_url":"https://x/a"}]"#).unwrap();
    assert_eq!(list.into_articles().len(), 1);

    let envelope: ArticleFile = serde_json::from_str(
        r#"{"status":"OK","results":[{"title":"A","article_url":"https://x/a"},{"title":"B"}]}"#,
    )
    .unwrap();
    assert_eq!(envelope.into_articles().len(), 2);
}
