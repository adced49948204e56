//! Weighted, bias-corrected sentiment aggregation.
//!
//! Each document contributes `base * weight` where
//! `weight = confidence * recency * ln(1 + engagement + 1)`. Neutral documents
//! carry a small negative base and the bullish threshold sits further from
//! zero than the bearish one; both offset the positive skew of social data.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use stockctx_core::SentimentTuning;

use crate::types::{AggregateSentiment, RawSentiment, ScoredDocument, SentimentVerdict};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SentimentAggregator {
    tuning: SentimentTuning,
}

impl SentimentAggregator {
    #[must_use]
    pub fn new(tuning: SentimentTuning) -> Self {
        Self { tuning }
    }

    #[must_use]
    pub fn tuning(&self) -> &SentimentTuning {
        &self.tuning
    }

    #[must_use]
    pub fn compute(&self, documents: &[ScoredDocument]) -> AggregateSentiment {
        self.compute_at(documents, Utc::now())
    }

    /// Aggregate as of `now`; recency weights are measured against it.
    #[must_use]
    pub fn compute_at(
        &self,
        documents: &[ScoredDocument],
        now: DateTime<Utc>,
    ) -> AggregateSentiment {
        let mut distribution: BTreeMap<RawSentiment, usize> =
            RawSentiment::ALL.into_iter().map(|l| (l, 0)).collect();
        let mut weighted_sum = 0.0_f64;
        let mut total_weight = 0.0_f64;
        let mut filtered = 0_usize;

        for doc in documents {
            *distribution.entry(doc.label).or_insert(0) += 1;

            if doc.confidence < self.tuning.min_confidence {
                filtered += 1;
                continue;
            }

            let base = match doc.label {
                RawSentiment::Negative => -1.0,
                RawSentiment::Neutral => self.tuning.neutral_base,
                RawSentiment::Positive => 1.0,
            };
            let recency = recency_weight(doc.timestamp.as_deref(), now);
            let engagement = (1.0 + doc.engagement_score + 1.0).ln();

            let weight = doc.confidence * recency * engagement;
            weighted_sum += base * weight;
            total_weight += weight;
        }

        let included = documents.len() - filtered;
        tracing::info!(
            positive = distribution[&RawSentiment::Positive],
            neutral = distribution[&RawSentiment::Neutral],
            negative = distribution[&RawSentiment::Negative],
            filtered,
            included,
            "sentiment distribution"
        );

        let score = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            0.0
        };
        let label = if score < self.tuning.bearish_threshold {
            SentimentVerdict::Bearish
        } else if score > self.tuning.bullish_threshold {
            SentimentVerdict::Bullish
        } else {
            SentimentVerdict::Neutral
        };
        #[allow(clippy::cast_precision_loss)]
        let confidence = (total_weight / included.max(1) as f64 / 2.0).min(1.0);

        AggregateSentiment {
            score: round3(score),
            label,
            confidence: round3(confidence),
            post_count: documents.len(),
            included_count: included,
            distribution,
        }
    }
}

/// `2.0` under 24 hours old, `1.5` under 72, else `1.0`. Timestamps that do
/// not parse, or carry no UTC offset, weigh `1.0`.
#[must_use]
pub fn recency_weight(timestamp: Option<&str>, now: DateTime<Utc>) -> f64 {
    let Some(posted) = timestamp.and_then(parse_timestamp) else {
        return 1.0;
    };
    let Some(micros) = (now - posted.with_timezone(&Utc)).num_microseconds() else {
        return 1.0;
    };
    #[allow(clippy::cast_precision_loss)]
    let hours_old = micros as f64 / 3_600_000_000.0;
    if hours_old < 24.0 {
        2.0
    } else if hours_old < 72.0 {
        1.5
    } else {
        1.0
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .ok()
}

/// Round to 3 decimals, ties to even on the exact binary value.
fn round3(value: f64) -> f64 {
    format!("{value:.3}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn hours_ago(hours: i64) -> Option<String> {
        Some((now() - Duration::hours(hours)).to_rfc3339())
    }

    fn doc(label: RawSentiment, confidence: f64, hours: i64, engagement: f64) -> ScoredDocument {
        ScoredDocument {
            label,
            confidence,
            timestamp: hours_ago(hours),
            engagement_score: engagement,
        }
    }

    fn aggregator() -> SentimentAggregator {
        SentimentAggregator::default()
    }

    #[test]
    fn empty_batch_is_neutral_zero() {
        let result = aggregator().compute_at(&[], now());
        assert_eq!(result.score, 0.0);
        assert_eq!(result.label, SentimentVerdict::Neutral);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.post_count, 0);
        assert_eq!(result.included_count, 0);
        assert_eq!(result.distribution.len(), 3);
        assert!(result.distribution.values().all(|&c| c == 0));
    }

    #[test]
    fn mixed_batch_matches_hand_computed_values() {
        let docs = [
            doc(RawSentiment::Positive, 0.9, 1, 0.0),
            doc(RawSentiment::Negative, 0.8, 100, 10.0),
        ];
        let result = aggregator().compute_at(&docs, now());
        assert_eq!(result.score, -0.229);
        assert_eq!(result.label, SentimentVerdict::Bearish);
        assert_eq!(result.confidence, 0.809);
        assert_eq!(result.included_count, 2);
    }

    #[test]
    fn neutral_base_and_recency_tiers_feed_the_score() {
        let docs = [
            doc(RawSentiment::Positive, 0.95, 1, 5.0),
            doc(RawSentiment::Neutral, 0.7, 48, 0.0),
            doc(RawSentiment::Negative, 0.65, 100, 1.0),
        ];
        let result = aggregator().compute_at(&docs, now());
        assert_eq!(result.score, 0.573);
        assert_eq!(result.label, SentimentVerdict::Bullish);
        assert_eq!(result.confidence, 0.857);
    }

    #[test]
    fn flipping_every_label_negates_the_score() {
        let positive = [
            doc(RawSentiment::Positive, 0.9, 2, 3.0),
            doc(RawSentiment::Positive, 0.7, 30, 0.0),
            doc(RawSentiment::Negative, 0.8, 200, 12.0),
        ];
        let negative: Vec<ScoredDocument> = positive
            .iter()
            .cloned()
            .map(|mut d| {
                d.label = match d.label {
                    RawSentiment::Positive => RawSentiment::Negative,
                    RawSentiment::Negative => RawSentiment::Positive,
                    RawSentiment::Neutral => RawSentiment::Neutral,
                };
                d
            })
            .collect();

        let a = aggregator().compute_at(&positive, now());
        let b = aggregator().compute_at(&negative, now());
        assert_eq!(a.score, -b.score);
        assert_eq!(a.confidence, b.confidence);
    }

    fn undated(label: RawSentiment, confidence: f64) -> ScoredDocument {
        ScoredDocument {
            label,
            confidence,
            timestamp: None,
            engagement_score: 0.0,
        }
    }

    #[test]
    fn equal_opposing_posts_cancel_to_neutral() {
        let docs = [
            undated(RawSentiment::Positive, 0.9),
            undated(RawSentiment::Negative, 0.9),
        ];
        let result = aggregator().compute_at(&docs, now());
        assert_eq!(result.score, 0.0);
        assert_eq!(result.label, SentimentVerdict::Neutral);
        // 2 * 0.9 * ln 2 / 2 included / 2
        assert_eq!(result.confidence, 0.312);
        assert_eq!(result.included_count, 2);
    }

    #[test]
    fn posts_below_confidence_floor_only_count_in_distribution() {
        let docs = [
            undated(RawSentiment::Negative, 0.5),
            undated(RawSentiment::Neutral, 0.5),
            undated(RawSentiment::Positive, 0.5),
        ];
        let result = aggregator().compute_at(&docs, now());
        assert_eq!(result.post_count, 3);
        assert_eq!(result.included_count, 0);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.label, SentimentVerdict::Neutral);
        assert_eq!(result.confidence, 0.0);
        assert!(result.distribution.values().all(|&c| c == 1));
        assert_eq!(result.distribution.len(), 3);
    }

    #[test]
    fn low_confidence_documents_are_counted_but_not_weighted() {
        let docs = [
            doc(RawSentiment::Negative, 0.59, 1, 100.0),
            doc(RawSentiment::Positive, 0.9, 1, 0.0),
        ];
        let result = aggregator().compute_at(&docs, now());
        assert_eq!(result.score, 1.0);
        assert_eq!(result.label, SentimentVerdict::Bullish);
        assert_eq!(result.post_count, 2);
        assert_eq!(result.included_count, 1);
        assert_eq!(result.distribution[&RawSentiment::Negative], 1);
        assert_eq!(result.distribution[&RawSentiment::Positive], 1);
    }

    #[test]
    fn all_filtered_is_neutral_with_zero_confidence() {
        let docs = [doc(RawSentiment::Positive, 0.3, 1, 50.0)];
        let result = aggregator().compute_at(&docs, now());
        assert_eq!(result.score, 0.0);
        assert_eq!(result.label, SentimentVerdict::Neutral);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.included_count, 0);
    }

    #[test]
    fn thresholds_are_strict() {
        let tuning = SentimentTuning {
            bearish_threshold: -1.0,
            bullish_threshold: 1.0,
            ..SentimentTuning::default()
        };
        let agg = SentimentAggregator::new(tuning);

        let all_positive = agg.compute_at(&[doc(RawSentiment::Positive, 0.9, 1, 0.0)], now());
        assert_eq!(all_positive.score, 1.0);
        assert_eq!(all_positive.label, SentimentVerdict::Neutral);

        let all_negative = agg.compute_at(&[doc(RawSentiment::Negative, 0.9, 1, 0.0)], now());
        assert_eq!(all_negative.score, -1.0);
        assert_eq!(all_negative.label, SentimentVerdict::Neutral);
    }

    #[test]
    fn single_neutral_lands_on_neutral_base() {
        let result = aggregator().compute_at(&[doc(RawSentiment::Neutral, 0.9, 1, 0.0)], now());
        assert_eq!(result.score, -0.05);
        assert_eq!(result.label, SentimentVerdict::Neutral);
    }

    #[test]
    fn confidence_is_capped_at_one() {
        let docs = [doc(RawSentiment::Positive, 1.0, 1, 1000.0)];
        assert_eq!(aggregator().compute_at(&docs, now()).confidence, 1.0);
    }

    #[test]
    fn recency_tiers() {
        assert_eq!(recency_weight(hours_ago(1).as_deref(), now()), 2.0);
        assert_eq!(recency_weight(hours_ago(23).as_deref(), now()), 2.0);
        assert_eq!(recency_weight(hours_ago(24).as_deref(), now()), 1.5);
        assert_eq!(recency_weight(hours_ago(71).as_deref(), now()), 1.5);
        assert_eq!(recency_weight(hours_ago(72).as_deref(), now()), 1.0);
        assert_eq!(recency_weight(Some("2026-10-18T10:00:00Z"), now()), 2.0);
        assert_eq!(recency_weight(Some("2026-10-17 00:00:00+00:00"), now()), 1.5);
    }

    #[test]
    fn unusable_timestamps_weigh_one() {
        assert_eq!(recency_weight(None, now()), 1.0);
        assert_eq!(recency_weight(Some(""), now()), 1.0);
        assert_eq!(recency_weight(Some("yesterday"), now()), 1.0);
        assert_eq!(recency_weight(Some("2026-10-18T11:00:00"), now()), 1.0);
    }

    #[test]
    fn round3_uses_exact_binary_value() {
        assert_eq!(round3(-0.228_786_817), -0.229);
        assert_eq!(round3(1.0005), 1.0);
        assert_eq!(round3(0.8089), 0.809);
    }
}
