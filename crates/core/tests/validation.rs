use serde_json::json;
use tipster_core::domain::fixture::Fixture;
use tipster_core::domain::recommendation::{DetailedAnalysis, Recommendation};
use tipster_core::llm::json::parse_batch;
use tipster_core::matching::{matches, normalize};
use tipster_core::validation::{Issue, PredictionValidator, ValidationEvent};

fn fixtures() -> Vec<Fixture> {
    vec![
        Fixture::new("AS Roma", "Viktoria Plzen").with_competition("Europa League"),
        Fixture::new("Paris Saint-Germain", "Bayern Munich").with_competition("Champions League"),
        Fixture::new("Lille", "Lens").with_competition("Ligue 1"),
        Fixture::new("FSV Mainz 05", "Bayer Leverkusen").with_competition("Bundesliga"),
    ]
}

fn rec(label: &str, odds: f64) -> Recommendation {
    Recommendation::new(label, odds)
}

#[test]
fn normalization_is_idempotent() {
    for name in ["AS Roma", "FSV Mainz 05", "FC Bayern München", "  Lille OSC ", "Real Madrid CF"] {
        let once = normalize(name);
        assert_eq!(normalize(&once), once, "{name}");
    }
}

#[test]
fn matcher_is_symmetric() {
    let names = ["AS Roma", "Roma", "Viktoria Plzen", "Plzen", "Lille", "Lens", "Mainz", "Bayer Leverkusen"];
    for a in names {
        for b in names {
            assert_eq!(matches(a, b), matches(b, a), "{a} / {b}");
        }
    }
}

#[test]
fn corrects_inverted_roma_plzen() {
    let v = PredictionValidator::new(&fixtures());
    let (kept, report) = v.validate_and_fix(vec![rec("Plzen vs AS Roma", 1.9)], 1.5);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].match_label, "AS Roma vs Viktoria Plzen");
    assert_eq!(report.corrections_count, 1);
    assert_eq!(report.corrections[0].issue, Issue::HomeAwayInverted);
    assert_eq!(report.corrections[0].match_label, "Plzen vs AS Roma");
    assert!(report.to_string().contains("1 correction(s) applied"));
}

#[test]
fn odds_floor_rejects_before_anything_else() {
    let v = PredictionValidator::new(&fixtures());
    let (kept, report) = v.validate_and_fix(
        vec![
            rec("Lille vs Lens", 1.50),
            rec("AS Roma vs Viktoria Plzen", 1.70),
            rec("Mainz vs Leverkusen", 2.10),
        ],
        1.70,
    );

    let odds: Vec<f64> = kept.iter().map(|r| r.odds).collect();
    assert_eq!(odds, vec![1.70, 2.10]);
    assert!(kept.iter().all(|r| r.odds >= 1.70));
    assert_eq!(report.rejected_low_odds_count, 1);
    assert_eq!(report.rejected_low_odds[0].match_label, "Lille vs Lens");
}

#[test]
fn unparseable_label_passes_through() {
    let v = PredictionValidator::new(&fixtures());
    let original = rec("Roma to win", 2.0);
    let (kept, report) = v.validate_and_fix(vec![original.clone()], 1.5);

    assert_eq!(kept, vec![original]);
    assert_eq!(report.corrections_count, 0);
    assert!(matches!(report.events[0], ValidationEvent::UnparseableMatch { .. }));
}

#[test]
fn correct_orientation_is_a_no_op() {
    let v = PredictionValidator::new(&fixtures());
    let original = rec("Paris Saint-Germain vs Bayern Munich", 2.4);
    let (kept, report) = v.validate_and_fix(vec![original.clone()], 1.5);

    assert_eq!(kept, vec![original]);
    assert!(report.is_clean());
    assert!(report.to_string().contains("No corrections needed"));
}

#[test]
fn nested_sections_follow_the_label() {
    let mut r = rec("Leverkusen vs Mainz", 2.2);
    r.detailed_analysis = Some(
        serde_json::from_value::<DetailedAnalysis>(json!({
            "recent_form": {"home_team": "Leverkusen: WWWDW", "away_team": "Mainz: LDLWL"},
            "injuries_suspensions": {"home_team": ["Wirtz"], "away_team": []},
            "schedule_fatigue": {"home_team": "Leverkusen played Tuesday"},
            "key_stats": {"home_team": "x", "away_team": "y"},
        }))
        .unwrap(),
    );

    let v = PredictionValidator::new(&fixtures());
    let (kept, report) = v.validate_and_fix(vec![r], 1.5);
    let fixed = &kept[0];
    let analysis = &fixed.detailed_analysis.as_ref().unwrap().0;

    assert_eq!(fixed.match_label, "FSV Mainz 05 vs Bayer Leverkusen");
    assert_eq!(analysis["recent_form"]["home_team"], json!("Mainz: LDLWL"));
    assert_eq!(analysis["recent_form"]["away_team"], json!("Leverkusen: WWWDW"));
    assert_eq!(analysis["injuries_suspensions"]["away_team"], json!(["Wirtz"]));
    // Partial and unrelated sections are left alone.
    assert_eq!(analysis["schedule_fatigue"], json!({"home_team": "Leverkusen played Tuesday"}));
    assert_eq!(analysis["key_stats"]["home_team"], json!("x"));
    assert!(matches!(
        report.events[0],
        ValidationEvent::HomeAwayInverted { swapped_sections: 2, .. }
    ));
}

#[test]
fn raw_model_reply_end_to_end() {
    let reply = r#"Here are today's picks:
```json
{
  "analysis_date": "2026-10-15",
  "recommendations": [
    {"match": "Viktoria Plzen vs AS Roma", "bet_type": "1X2", "prediction": "1", "odds": 1.85, "confidence": 78},
    {"match": "Lens - Lille", "bet_type": "BTTS", "prediction": "Yes", "odds": 1.40, "confidence": 80},
    {"match": "Ajax vs PSV", "bet_type": "Over/Under", "prediction": "Over 2.5", "odds": 1.95, "confidence": 76}
  ],
  "combined_bet": {"matches": ["Viktoria Plzen vs AS Roma", "Ajax vs PSV"], "total_odds": 3.61}
}
```"#;

    let batch = parse_batch(reply, 8).unwrap();
    let v = PredictionValidator::new(&fixtures());
    let (batch, report) = v.validate_batch(batch, 1.5);

    let labels: Vec<_> = batch.recommendations.iter().map(|r| r.match_label.as_str()).collect();
    assert_eq!(labels, vec!["AS Roma vs Viktoria Plzen", "Ajax vs PSV"]);
    assert_eq!(report.corrections_count, 1);
    assert_eq!(report.rejected_low_odds_count, 1);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(
        batch.combined_bet.unwrap().matches,
        vec!["AS Roma vs Viktoria Plzen".to_string(), "Ajax vs PSV".to_string()]
    );
}
