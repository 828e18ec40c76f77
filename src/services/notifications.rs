use std::{fmt::Write as _, time::Duration};

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::{
    config::SmtpConfig,
    entities::order,
    errors::ServiceError,
    metrics,
};

/// A rendered email ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Outbound email transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError>;

    /// False when no transport is configured
    fn is_enabled(&self) -> bool {
        true
    }
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, timeout: Duration) -> Result<Self, ServiceError> {
        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| ServiceError::ValidationError(format!("Invalid from address: {}", e)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| {
                ServiceError::InternalError(format!("Failed to create SMTP transport: {}", e))
            })?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(timeout))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| ServiceError::ValidationError(format!("Invalid recipient: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(message.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(message.html),
                    ),
            )
            .map_err(|e| ServiceError::InternalError(format!("Failed to build email: {}", e)))?;

        self.transport.send(email).await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("SMTP delivery failed: {}", e))
        })?;
        Ok(())
    }
}

/// Used when no SMTP block is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        debug!(to = %message.to, "email disabled, dropping message");
        Err(ServiceError::ExternalServiceError(
            "Email delivery is not configured".to_string(),
        ))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the invoice for an order group. `orders` must be the group's rows
/// with the parent first.
pub fn render_invoice(
    recipient: &str,
    customer_name: &str,
    orders: &[order::Model],
) -> Result<EmailMessage, ServiceError> {
    let parent = orders
        .iter()
        .find(|o| o.is_parent)
        .or_else(|| orders.first())
        .ok_or_else(|| ServiceError::InternalError("Cannot invoice an empty order".to_string()))?;

    let currency = &parent.currency;
    let sum = |f: fn(&order::Model) -> Decimal| orders.iter().map(f).sum::<Decimal>();
    let sub_total = parent.group_sub_total.unwrap_or_else(|| sum(|o| o.sub_total));
    let discount = parent.group_discount.unwrap_or_else(|| sum(|o| o.discount_amount));
    let tax = parent.group_tax.unwrap_or_else(|| sum(|o| o.tax_amount));
    let shipping = parent.group_shipping.unwrap_or_else(|| sum(|o| o.shipping_cost));
    let total = parent.group_total.unwrap_or_else(|| sum(|o| o.total_amount));

    let mut text = format!(
        "Hello {},\n\nThank you for your order {}.\n\n",
        customer_name, parent.order_id
    );
    let mut rows = String::new();
    for line in orders {
        let _ = writeln!(
            text,
            "{} x{} @ {} {} = {} {}",
            line.product_name, line.quantity, currency, line.unit_price, currency, line.sub_total
        );
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{} {}</td><td>{} {}</td></tr>",
            escape_html(&line.product_name),
            line.quantity,
            currency,
            line.unit_price,
            currency,
            line.sub_total
        );
    }
    let _ = write!(
        text,
        "\nSubtotal: {c} {}\nDiscount: {c} {}\nTax: {c} {}\nShipping: {c} {}\nTotal: {c} {}\n",
        sub_total,
        discount,
        tax,
        shipping,
        total,
        c = currency
    );

    let html = format!(
        "<html><body><p>Hello {name},</p><p>Thank you for your order <strong>{id}</strong>.</p>\
         <table><thead><tr><th>Product</th><th>Qty</th><th>Unit price</th><th>Amount</th></tr></thead>\
         <tbody>{rows}</tbody></table>\
         <p>Subtotal: {c} {sub}<br/>Discount: {c} {disc}<br/>Tax: {c} {tax}<br/>Shipping: {c} {ship}<br/>\
         <strong>Total: {c} {total}</strong></p></body></html>",
        name = escape_html(customer_name),
        id = escape_html(&parent.order_id),
        rows = rows,
        c = currency,
        sub = sub_total,
        disc = discount,
        tax = tax,
        ship = shipping,
        total = total,
    );

    Ok(EmailMessage {
        to: recipient.to_string(),
        subject: format!("Invoice for order {}", parent.order_id),
        html,
        text,
    })
}

/// Render and send an invoice; failures are logged and reported as `false`.
pub async fn send_invoice(
    mailer: &dyn Mailer,
    recipient: Option<&str>,
    customer_name: &str,
    orders: &[order::Model],
) -> bool {
    let Some(recipient) = recipient.filter(|r| !r.trim().is_empty()) else {
        warn!("invoice requested but customer has no email address");
        return false;
    };
    if !mailer.is_enabled() {
        warn!("invoice requested but email is not configured");
        return false;
    }

    let result = match render_invoice(recipient, customer_name, orders) {
        Ok(message) => mailer.send(message).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "invoice email failed");
            metrics::increment(metrics::EMAIL_FAILED);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::entities::{
        order::{OrderMode, OrderSource, OrderStatus, OrderType, PaymentMethod, PaymentStatus},
        product::PriceOption,
    };

    fn line(is_parent: bool, name: &str) -> order::Model {
        let now = Utc::now();
        order::Model {
            id: Uuid::new_v4(),
            order_id: format!("ORD-20240301-{}", if is_parent { "AAAAAAAA" } else { "BBBBBBBB" }),
            order_group_id: Uuid::nil(),
            is_parent,
            source: OrderSource::Manual,
            order_type: OrderType::Btc,
            order_mode: OrderMode::Offline,
            user_id: None,
            customer_id: None,
            created_by: None,
            product_id: Uuid::new_v4(),
            product_name: name.to_string(),
            product_sku: "SKU".to_string(),
            price_option: PriceOption::Regular,
            quantity: 2,
            unit_price: dec!(10.00),
            sub_total: dec!(20.00),
            discount_amount: dec!(0),
            tax_amount: dec!(0),
            shipping_cost: dec!(0),
            total_amount: dec!(20.00),
            group_sub_total: is_parent.then_some(dec!(40.00)),
            group_discount: is_parent.then_some(dec!(0)),
            group_tax: is_parent.then_some(dec!(0)),
            group_shipping: is_parent.then_some(dec!(0)),
            group_total: is_parent.then_some(dec!(40.00)),
            currency: "NGN".to_string(),
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Paid,
            payment_reference: None,
            order_status: OrderStatus::Confirmed,
            estimated_delivery: None,
            actual_delivery: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn invoice_lists_every_line_and_group_total() {
        let orders = vec![line(true, "Kenya AA"), line(false, "Sumatra <Dark>")];
        let msg = render_invoice("buyer@example.com", "Ada", &orders).unwrap();
        assert_eq!(msg.subject, "Invoice for order ORD-20240301-AAAAAAAA");
        assert!(msg.text.contains("Kenya AA x2"));
        assert!(msg.text.contains("Total: NGN 40.00"));
        assert!(msg.html.contains("Sumatra &lt;Dark&gt;"));
    }

    #[tokio::test]
    async fn send_failure_is_reported_not_raised() {
        let mut mailer = MockMailer::new();
        mailer.expect_is_enabled().return_const(true);
        mailer
            .expect_send()
            .times(1)
            .returning(|_| Err(ServiceError::ExternalServiceError("down".into())));

        let sent = send_invoice(&mailer, Some("buyer@example.com"), "Ada", &[line(true, "Kenya AA")]).await;
        assert!(!sent);
    }

    #[tokio::test]
    async fn missing_address_skips_delivery() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(0);
        assert!(!send_invoice(&mailer, None, "Ada", &[line(true, "Kenya AA")]).await);
    }
}
