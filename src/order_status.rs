use crate::error::AppError;

pub const PENDING: &str = "pending";
pub const PAID: &str = "paid";
pub const SHIPPED: &str = "shipped";
pub const COMPLETED: &str = "completed";
pub const CANCELLED: &str = "cancelled";

pub const PAYMENT_UNPAID: &str = "unpaid";
pub const PAYMENT_PAID: &str = "paid";

const VALID: [&str; 5] = [PENDING, PAID, SHIPPED, COMPLETED, CANCELLED];

pub fn validate_order_status(status: &str) -> Result<(), AppError> {
    if VALID.contains(&status) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid order status".into()))
    }
}

pub fn can_transition(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        (PENDING, PAID)
            | (PENDING, CANCELLED)
            | (PAID, SHIPPED)
            | (PAID, CANCELLED)
            | (SHIPPED, COMPLETED)
    )
}

pub fn ensure_transition(from: &str, to: &str) -> Result<(), AppError> {
    validate_order_status(to)?;
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Cannot change order status from {from} to {to}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(can_transition(PENDING, PAID));
        assert!(can_transition(PAID, SHIPPED));
        assert!(can_transition(SHIPPED, COMPLETED));
    }

    #[test]
    fn shipped_orders_cannot_be_cancelled() {
        assert!(!can_transition(SHIPPED, CANCELLED));
        assert!(ensure_transition(SHIPPED, CANCELLED).is_err());
    }

    #[test]
    fn terminal_states_stay_put() {
        for to in VALID {
            assert!(!can_transition(COMPLETED, to));
            assert!(!can_transition(CANCELLED, to));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(matches!(
            ensure_transition(PENDING, "refunded"),
            Err(AppError::BadRequest(msg)) if msg == "Invalid order status"
        ));
    }
}
