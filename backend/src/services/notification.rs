//! Return lifecycle notifications
//!
//! Managers hear about new requests; the customer hears about evaluation,
//! approval and rejection. Delivery failures are logged and never undo the
//! state change that triggered them.

use shared::{ProductReturn, RefundMethod};
use sqlx::PgPool;

use crate::error::AppResult;
use crate::external::{MailRelayClient, OutgoingMail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnEvent {
    Requested,
    EvaluationStarted,
    Approved,
    Rejected,
}

impl ReturnEvent {
    fn notifies_managers(&self) -> bool {
        matches!(self, ReturnEvent::Requested)
    }
}

fn refund_method_label(method: RefundMethod) -> &'static str {
    match method {
        RefundMethod::Wallet => "billetera",
        RefundMethod::Original => "método de pago original",
        RefundMethod::Bank => "transferencia bancaria",
    }
}

/// Compose the mail for `event` on `ret`
pub fn return_mail(
    event: ReturnEvent,
    ret: &ProductReturn,
    product_name: &str,
    to: Vec<String>,
) -> OutgoingMail {
    let short_id = ret.id.simple().to_string();
    let short_id = &short_id[..8];

    let (subject, text) = match event {
        ReturnEvent::Requested => (
            format!("Nueva solicitud de devolución #{}", short_id),
            format!(
                "Un cliente solicitó una devolución.\n\n\
                 Orden: {}\nProducto: {}\nCantidad: {}\nMotivo: {:?}\n\n{}\n",
                ret.order_id, product_name, ret.quantity, ret.reason, ret.description
            ),
        ),
        ReturnEvent::EvaluationStarted => (
            format!("Tu devolución #{} está en evaluación", short_id),
            format!(
                "Recibimos tu {} (x{}) y lo estamos revisando.\n\n{}\n",
                product_name, ret.quantity, ret.manager_notes
            ),
        ),
        ReturnEvent::Approved => {
            let amount = ret
                .refund_amount
                .map(|a| format!("${}", a))
                .unwrap_or_else(|| "-".to_string());
            (
                format!("Tu devolución #{} fue aprobada", short_id),
                format!(
                    "Tu devolución de {} (x{}) fue aprobada.\n\
                     Reembolso: {} vía {}.\n\n{}\n",
                    product_name,
                    ret.quantity,
                    amount,
                    refund_method_label(ret.refund_method),
                    ret.evaluation_notes
                ),
            )
        }
        ReturnEvent::Rejected => (
            format!("Tu solicitud de devolución #{}", short_id),
            format!(
                "Tu devolución de {} (x{}) no fue aprobada.\n\nMotivo: {}\n",
                product_name, ret.quantity, ret.evaluation_notes
            ),
        ),
    };

    OutgoingMail { to, subject, text }
}

#[derive(Clone)]
pub struct ReturnNotifier {
    db: PgPool,
    mailer: MailRelayClient,
}

impl ReturnNotifier {
    pub fn new(db: PgPool, mailer: MailRelayClient) -> Self {
        Self { db, mailer }
    }

    pub async fn notify(&self, event: ReturnEvent, ret: &ProductReturn) {
        if let Err(e) = self.deliver(event, ret).await {
            tracing::warn!("Could not send {:?} notice for return {}: {}", event, ret.id, e);
        }
    }

    async fn deliver(&self, event: ReturnEvent, ret: &ProductReturn) -> AppResult<()> {
        let recipients = self.recipients(event, ret).await?;
        if recipients.is_empty() {
            tracing::debug!("No recipients for {:?} notice on return {}", event, ret.id);
            return Ok(());
        }

        let product_name = sqlx::query_scalar::<_, String>("SELECT name FROM products WHERE id = $1")
            .bind(ret.product_id)
            .fetch_optional(&self.db)
            .await?
            .unwrap_or_else(|| ret.product_id.to_string());

        self.mailer
            .send(&return_mail(event, ret, &product_name, recipients))
            .await
    }

    async fn recipients(&self, event: ReturnEvent, ret: &ProductReturn) -> AppResult<Vec<String>> {
        let emails = if event.notifies_managers() {
            sqlx::query_scalar::<_, String>(
                "SELECT email FROM users \
                 WHERE role IN ('MANAGER', 'ADMIN') AND is_active AND email <> ''",
            )
            .fetch_all(&self.db)
            .await?
        } else {
            sqlx::query_scalar::<_, String>(
                "SELECT email FROM users WHERE id = $1 AND email <> ''",
            )
            .bind(ret.user_id)
            .fetch_all(&self.db)
            .await?
        };
        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use shared::{ReturnReason, ReturnStatus};
    use uuid::Uuid;

    fn sample_return() -> ProductReturn {
        ProductReturn {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            quantity: 2,
            reason: ReturnReason::Defective,
            description: "No enciende".to_string(),
            status: ReturnStatus::Approved,
            refund_method: RefundMethod::Wallet,
            refund_amount: Some(Decimal::new(9980, 2)),
            manager_notes: String::new(),
            evaluation_notes: "Falla confirmada".to_string(),
            requested_at: Utc::now(),
            evaluated_at: None,
            processed_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_approval_mail_carries_refund() {
        let ret = sample_return();
        let mail = return_mail(
            ReturnEvent::Approved,
            &ret,
            "Auriculares",
            vec!["cliente@example.com".to_string()],
        );
        assert!(mail.subject.contains("aprobada"));
        assert!(mail.text.contains("$99.80"));
        assert!(mail.text.contains("billetera"));
        assert!(mail.text.contains("Auriculares"));
        assert_eq!(mail.to, vec!["cliente@example.com".to_string()]);
    }

    #[test]
    fn test_rejection_mail_carries_reason() {
        let mut ret = sample_return();
        ret.evaluation_notes = "Producto usado".to_string();
        let mail = return_mail(ReturnEvent::Rejected, &ret, "Mouse", vec![]);
        assert!(mail.text.contains("Motivo: Producto usado"));
    }

    #[test]
    fn test_only_new_requests_go_to_managers() {
        assert!(ReturnEvent::Requested.notifies_managers());
        assert!(!ReturnEvent::EvaluationStarted.notifies_managers());
        assert!(!ReturnEvent::Approved.notifies_managers());
        assert!(!ReturnEvent::Rejected.notifies_managers());
    }
}
