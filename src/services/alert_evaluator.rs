//! Decides whether one alert fires against one ticker snapshot.
//!
//! Everything here is pure: no store access, no clock. The caller passes `now`.

use mongodb::bson::oid::ObjectId;

use crate::{
    error::EvaluationError,
    models::{Alert, AlertKind, TickerSnapshot},
};

/// Minimum spacing between two delivered notifications of the same alert.
pub const COOLDOWN_MS: i64 = 60 * 60 * 1000;

/// Everything needed to record and notify one firing.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertTrigger {
    pub alert_id: ObjectId,
    pub user_id: ObjectId,
    pub ticker_id: ObjectId,
    pub kind: AlertKind,
    pub measured_value: f64,
    pub threshold: f64,
    pub user_email: String,
    pub ticker_symbol: String,
    pub ticker_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    NoFire,
    Cooldown,
    Fired(AlertTrigger),
}

pub fn in_cooldown(alert: &Alert, now: i64) -> bool {
    alert
        .last_triggered
        .is_some_and(|last| now - last < COOLDOWN_MS)
}

pub fn evaluate(
    alert: &Alert,
    ticker: &TickerSnapshot,
    owner_email: &str,
    now: i64,
) -> Result<Evaluation, EvaluationError> {
    if in_cooldown(alert, now) {
        return Ok(Evaluation::Cooldown);
    }

    if alert.kind == AlertKind::Unknown {
        tracing::warn!(alert_id = %alert.id, "alert has an unknown kind, skipping");
        return Ok(Evaluation::NoFire);
    }

    let threshold = alert.threshold().ok_or_else(|| EvaluationError::MissingThreshold {
        alert_id: alert.id.to_hex(),
        kind: alert.kind.to_string(),
    })?;

    let (measured, fires) = match alert.kind {
        AlertKind::PriceAbove => (ticker.price, ticker.price > threshold),
        AlertKind::PriceBelow => (ticker.price, ticker.price < threshold),
        AlertKind::VolumeAbove => (ticker.volume, ticker.volume > threshold),
        // either direction counts
        AlertKind::ChangePercent => (
            ticker.change_percent_24h,
            ticker.change_percent_24h.abs() >= threshold.abs(),
        ),
        AlertKind::Unknown => return Ok(Evaluation::NoFire),
    };

    if !fires {
        return Ok(Evaluation::NoFire);
    }

    Ok(Evaluation::Fired(AlertTrigger {
        alert_id: alert.id,
        user_id: alert.user_id,
        ticker_id: ticker.id,
        kind: alert.kind,
        measured_value: measured,
        threshold,
        user_email: owner_email.to_string(),
        ticker_symbol: ticker.symbol.clone(),
        ticker_name: ticker.name.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_707_993_000_000;
    const MINUTE: i64 = 60_000;

    fn alert(kind: AlertKind) -> Alert {
        Alert {
            id: ObjectId::new(),
            user_id: ObjectId::new(),
            ticker_id: ObjectId::new(),
            kind,
            price_above: None,
            price_below: None,
            volume_above: None,
            change_percent: None,
            is_active: true,
            last_triggered: None,
        }
    }

    fn ticker(price: f64, volume: f64, change: f64) -> TickerSnapshot {
        TickerSnapshot {
            id: ObjectId::new(),
            symbol: "SNDL".to_string(),
            name: "Sundial Growers".to_string(),
            price,
            volume,
            change_percent_24h: change,
        }
    }

    fn fired(e: Evaluation) -> AlertTrigger {
        match e {
            Evaluation::Fired(t) => t,
            other => panic!("expected a firing, got {other:?}"),
        }
    }

    #[test]
    fn price_above_is_strict() {
        let mut a = alert(AlertKind::PriceAbove);
        a.price_above = Some(10.0);

        let t = fired(evaluate(&a, &ticker(12.5, 0.0, 0.0), "a@x.io", NOW).unwrap());
        assert_eq!(t.measured_value, 12.5);
        assert_eq!(t.threshold, 10.0);
        assert_eq!(t.ticker_symbol, "SNDL");
        assert_eq!(t.user_email, "a@x.io");

        assert_eq!(evaluate(&a, &ticker(10.0, 0.0, 0.0), "a@x.io", NOW).unwrap(), Evaluation::NoFire);
    }

    #[test]
    fn price_below_is_strict() {
        let mut a = alert(AlertKind::PriceBelow);
        a.price_below = Some(1.0);

        assert!(matches!(evaluate(&a, &ticker(0.8, 0.0, 0.0), "", NOW).unwrap(), Evaluation::Fired(_)));
        assert_eq!(evaluate(&a, &ticker(1.0, 0.0, 0.0), "", NOW).unwrap(), Evaluation::NoFire);
    }

    #[test]
    fn volume_above_measures_volume() {
        let mut a = alert(AlertKind::VolumeAbove);
        a.volume_above = Some(1_000_000.0);

        let t = fired(evaluate(&a, &ticker(2.0, 1_500_000.0, 0.0), "", NOW).unwrap());
        assert_eq!(t.measured_value, 1_500_000.0);
    }

    #[test]
    fn change_percent_ignores_sign() {
        let mut a = alert(AlertKind::ChangePercent);
        a.change_percent = Some(5.0);

        let t = fired(evaluate(&a, &ticker(1.0, 0.0, -7.5), "", NOW).unwrap());
        assert_eq!(t.measured_value, -7.5);

        assert!(matches!(evaluate(&a, &ticker(1.0, 0.0, 5.0), "", NOW).unwrap(), Evaluation::Fired(_)));
        assert_eq!(evaluate(&a, &ticker(1.0, 0.0, -4.99), "", NOW).unwrap(), Evaluation::NoFire);

        a.change_percent = Some(-5.0);
        assert!(matches!(evaluate(&a, &ticker(1.0, 0.0, 6.0), "", NOW).unwrap(), Evaluation::Fired(_)));
    }

    #[test]
    fn cooldown_runs_before_threshold() {
        let mut a = alert(AlertKind::PriceAbove);
        a.price_above = Some(10.0);
        let snap = ticker(12.5, 0.0, 0.0);

        a.last_triggered = Some(NOW - 30 * MINUTE);
        assert_eq!(evaluate(&a, &snap, "", NOW).unwrap(), Evaluation::Cooldown);

        a.last_triggered = Some(NOW - 120 * MINUTE);
        assert!(matches!(evaluate(&a, &snap, "", NOW).unwrap(), Evaluation::Fired(_)));

        // exactly one hour is out of cooldown
        a.last_triggered = Some(NOW - COOLDOWN_MS);
        assert!(matches!(evaluate(&a, &snap, "", NOW).unwrap(), Evaluation::Fired(_)));
    }

    #[test]
    fn cooldown_applies_even_without_a_threshold() {
        let mut a = alert(AlertKind::PriceAbove);
        a.last_triggered = Some(NOW - MINUTE);
        assert_eq!(evaluate(&a, &ticker(12.5, 0.0, 0.0), "", NOW).unwrap(), Evaluation::Cooldown);
    }

    #[test]
    fn unknown_kind_never_fires() {
        let a = alert(AlertKind::Unknown);
        assert_eq!(evaluate(&a, &ticker(99.0, 1e9, 50.0), "", NOW).unwrap(), Evaluation::NoFire);
    }

    #[test]
    fn missing_threshold_is_an_error() {
        let mut a = alert(AlertKind::VolumeAbove);
        // unrelated thresholds are ignored
        a.price_above = Some(1.0);

        let err = evaluate(&a, &ticker(2.0, 10.0, 0.0), "", NOW).unwrap_err();
        assert!(matches!(err, EvaluationError::MissingThreshold { .. }));
    }

    #[test]
    fn unknown_kind_decodes_from_storage() {
        let kind: AlertKind = serde_json::from_str("\"NEWS_MENTION\"").unwrap();
        assert_eq!(kind, AlertKind::Unknown);

        let kind: AlertKind = serde_json::from_str("\"CHANGE_PERCENT\"").unwrap();
        assert_eq!(kind, AlertKind::ChangePercent);
    }
}
