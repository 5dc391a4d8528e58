//! Alert rules: pure functions of the latest event and the sliding window

use super::window::SlidingWindow;
use crate::config::AlertingConfig;
use crate::types::{AlertPayload, AlertType, ScoredEvent};
use serde_json::Value;

/// One alerting rule with its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum AlertRule {
    /// The latest score alone is above `threshold`
    HighScore { threshold: f64 },
    /// At least `min_count` of the last `window` entries are anomalous
    ConsecutiveAnomalies {
        window: usize,
        min_count: usize,
        anomaly_threshold: f64,
    },
    /// Once `window` entries exist, the anomalous share of the last `window`
    /// entries is above `rate_threshold`
    HighRate {
        window: usize,
        rate_threshold: f64,
        anomaly_threshold: f64,
    },
}

impl AlertRule {
    /// The rule set in evaluation order
    pub fn from_config(config: &AlertingConfig) -> Vec<AlertRule> {
        vec![
            AlertRule::HighScore {
                threshold: config.high_score_threshold,
            },
            AlertRule::ConsecutiveAnomalies {
                window: config.consecutive_window,
                min_count: config.consecutive_min,
                anomaly_threshold: config.anomaly_score_threshold,
            },
            AlertRule::HighRate {
                window: config.rate_window,
                rate_threshold: config.rate_threshold,
                anomaly_threshold: config.anomaly_score_threshold,
            },
        ]
    }

    pub fn alert_type(&self) -> AlertType {
        match self {
            AlertRule::HighScore { .. } => AlertType::HighScore,
            AlertRule::ConsecutiveAnomalies { .. } => AlertType::ConsecutiveAnomalies,
            AlertRule::HighRate { .. } => AlertType::HighRate,
        }
    }

    /// Evaluate against the window, which already contains `latest`.
    ///
    /// Returns the alert diagnostics when the condition holds. Evaluation is
    /// level-triggered: nothing is remembered between calls, so a rule fires
    /// again on every evaluation for as long as its condition holds.
    pub fn evaluate(&self, latest: &ScoredEvent, window: &SlidingWindow) -> Option<AlertPayload> {
        match *self {
            AlertRule::HighScore { threshold } => {
                let score = latest.score();
                (score > threshold).then(|| {
                    payload([
                        ("score", Value::from(score)),
                        ("threshold", Value::from(threshold)),
                        (
                            "message",
                            Value::from(format!("High anomaly score detected: {:.4}", score)),
                        ),
                    ])
                })
            }
            AlertRule::ConsecutiveAnomalies {
                window: span,
                min_count,
                anomaly_threshold,
            } => {
                let count = window
                    .tail(span)
                    .filter(|event| event.score() > anomaly_threshold)
                    .count();
                (count >= min_count).then(|| {
                    payload([
                        ("count", Value::from(count)),
                        ("threshold", Value::from(min_count)),
                        (
                            "message",
                            Value::from(format!(
                                "Multiple consecutive anomalies detected: {}",
                                count
                            )),
                        ),
                    ])
                })
            }
            AlertRule::HighRate {
                window: span,
                rate_threshold,
                anomaly_threshold,
            } => {
                if span == 0 || window.len() < span {
                    return None;
                }
                let anomalous = window
                    .tail(span)
                    .filter(|event| event.score() > anomaly_threshold)
                    .count();
                let rate = anomalous as f64 / span as f64;
                (rate > rate_threshold).then(|| {
                    payload([
                        ("rate", Value::from(rate)),
                        ("threshold", Value::from(rate_threshold)),
                        (
                            "message",
                            Value::from(format!("High anomaly rate detected: {:.2}%", rate * 100.0)),
                        ),
                    ])
                })
            }
        }
    }
}

fn payload<const N: usize>(entries: [(&str, Value); N]) -> AlertPayload {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::sync::Arc;

    fn window_of(scores: &[f64]) -> SlidingWindow {
        let mut window = SlidingWindow::new(100);
        for &score in scores {
            window.push(Arc::new(ScoredEvent::new(0.0, score, 0.05, vec![])));
        }
        window
    }

    fn rule(alert_type: AlertType) -> AlertRule {
        AlertRule::from_config(&AppConfig::default().alerting)
            .into_iter()
            .find(|rule| rule.alert_type() == alert_type)
            .unwrap()
    }

    fn fires(rule: &AlertRule, scores: &[f64]) -> Option<AlertPayload> {
        let window = window_of(scores);
        let latest = window.iter().last().cloned().unwrap();
        rule.evaluate(&latest, &window)
    }

    #[test]
    fn test_rule_order_is_fixed() {
        let types: Vec<AlertType> = AlertRule::from_config(&AppConfig::default().alerting)
            .iter()
            .map(AlertRule::alert_type)
            .collect();
        assert_eq!(
            types,
            vec![
                AlertType::HighScore,
                AlertType::ConsecutiveAnomalies,
                AlertType::HighRate
            ]
        );
    }

    #[test]
    fn test_high_score_looks_only_at_latest() {
        let rule = rule(AlertType::HighScore);
        assert!(fires(&rule, &[0.5, 0.0]).is_none());
        assert!(fires(&rule, &[0.1]).is_none());

        let payload = fires(&rule, &[0.0, 0.25]).unwrap();
        assert_eq!(payload["score"], 0.25);
        assert_eq!(payload["message"], "High anomaly score detected: 0.2500");
    }

    #[test]
    fn test_consecutive_boundary() {
        let rule = rule(AlertType::ConsecutiveAnomalies);

        let mut two = vec![0.01; 8];
        two.extend([0.06, 0.07]);
        assert!(fires(&rule, &two).is_none());

        let mut three = vec![0.01; 7];
        three.extend([0.06, 0.07, 0.08]);
        let payload = fires(&rule, &three).unwrap();
        assert_eq!(payload["count"], 3);
        assert_eq!(payload["threshold"], 3);
    }

    #[test]
    fn test_consecutive_ignores_entries_before_last_ten() {
        let rule = rule(AlertType::ConsecutiveAnomalies);
        let mut scores = vec![0.9; 5];
        scores.extend(vec![0.0; 10]);
        assert!(fires(&rule, &scores).is_none());
    }

    #[test]
    fn test_rate_needs_full_span() {
        let rule = rule(AlertType::HighRate);
        assert!(fires(&rule, &[0.07; 19]).is_none());
        assert!(fires(&rule, &[0.07; 20]).is_some());
    }

    #[test]
    fn test_rate_boundary() {
        let rule = rule(AlertType::HighRate);

        let mut eleven = vec![0.01; 9];
        eleven.extend(vec![0.07; 11]);
        let payload = fires(&rule, &eleven).unwrap();
        assert_eq!(payload["rate"], 0.55);
        assert_eq!(payload["message"], "High anomaly rate detected: 55.00%");

        let mut ten = vec![0.01; 10];
        ten.extend(vec![0.07; 10]);
        assert!(fires(&rule, &ten).is_none());
    }
}
