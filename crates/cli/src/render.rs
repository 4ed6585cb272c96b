//! Plain-text rendering of storefront data.

use bazaar_core::Price;
use bazaar_storefront::CartLine;
use bazaar_storefront::models::{Address, Order, OrderTotals, Product, Review};
use bazaar_storefront::notifications::Notification;

pub fn product_row(product: &Product) -> String {
    let mut row = format!("{:<12} {:<36} {:>12}", product.id, product.name, product.price);
    if let Some(original) = product.original_price.filter(|p| *p > product.price) {
        row.push_str(&format!(" (was {original})"));
    }
    if product.is_out_of_stock() {
        row.push_str("  [out of stock]");
    }
    row
}

pub fn cart_line(index: usize, line: &CartLine) -> String {
    let mut options = Vec::new();
    if !line.options.size.is_empty() {
        options.push(format!("size {}", line.options.size));
    }
    if !line.options.color.is_empty() {
        options.push(line.options.color.clone());
    }
    let options = if options.is_empty() {
        String::new()
    } else {
        format!(" ({})", options.join(", "))
    };

    format!(
        "{index:>3}. {}{options} x{} @ {} = {}",
        line.product.name,
        line.quantity,
        line.product.price,
        line.line_total()
    )
}

pub fn totals(totals: &OrderTotals) -> Vec<String> {
    let row = |label: &str, amount: Price| format!("{label:>16}: {amount:>12}");
    let mut rows = vec![
        row("Subtotal", totals.subtotal),
        row("Shipping", totals.shipping_cost),
        row("Tax", totals.tax_amount),
    ];
    if !totals.payment_fee.is_zero() {
        rows.push(row("Payment fee", totals.payment_fee));
    }
    rows.push(row("Total", totals.total_amount));
    rows
}

pub fn order_row(order: &Order) -> String {
    format!(
        "{} #{} {} {} item(s) {} [{}] {}",
        order.created_at().format("%Y-%m-%d"),
        order.order_number(),
        order.id(),
        order.item_count(),
        order.totals().total_amount,
        order.status(),
        order.payment_method(),
    )
}

pub fn address_row(address: &Address) -> String {
    let marker = if address.is_default { "*" } else { " " };
    format!("{marker} {} {}", address.id, address.details.one_line())
}

pub fn review_row(review: &Review) -> String {
    let stars = "*".repeat(usize::from(review.rating));
    let verified = if review.verified_purchase {
        " (verified purchase)"
    } else {
        ""
    };
    let title = review
        .title
        .as_deref()
        .map(|t| format!("{t}: "))
        .unwrap_or_default();
    format!(
        "{stars:<5} {}{verified}: {title}{}",
        review.user.name, review.comment
    )
}

pub fn notification_row(notification: &Notification) -> String {
    let unread = if notification.read { " " } else { "•" };
    format!(
        "{unread} {} [{}] {}: {}",
        notification.id,
        notification.created_at.format("%Y-%m-%d %H:%M"),
        notification.title,
        notification.message
    )
}
