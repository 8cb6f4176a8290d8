//! Stop-loss and target levels from ATR multiples.

use crate::domain::calibration::SlTarget;
use crate::domain::signal::Action;

/// Display rounding: whole numbers above 100, one decimal otherwise.
pub fn format_price(price: f64) -> f64 {
    if price > 100.0 {
        price.round()
    } else {
        (price * 10.0).round() / 10.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskLevels {
    pub price: f64,
    pub stop_loss: f64,
    pub target: f64,
    pub trailing_stop_distance: f64,
    pub reason: String,
}

/// Prices a BUY or SELL at `close`.
///
/// Without a calibration entry the levels stay at zero and the reason is
/// returned as is.
pub fn apply_risk(
    action: Action,
    reason: &str,
    close: f64,
    atr: f64,
    multiples: Option<SlTarget>,
) -> RiskLevels {
    let price = format_price(close);
    let Some(m) = multiples else {
        return RiskLevels {
            price,
            stop_loss: 0.0,
            target: 0.0,
            trailing_stop_distance: 0.0,
            reason: reason.to_string(),
        };
    };

    let (raw_stop, raw_target) = match action {
        Action::Sell => (close + m.stop_loss_atr * atr, close - m.target_atr * atr),
        _ => (close - m.stop_loss_atr * atr, close + m.target_atr * atr),
    };
    let stop_loss = format_price(raw_stop);
    let target = format_price(raw_target);

    RiskLevels {
        price,
        stop_loss,
        target,
        trailing_stop_distance: (stop_loss - price).abs().round(),
        reason: format!("{}. Stop loss = {} and Target {}", reason, stop_loss, target),
    }
}
