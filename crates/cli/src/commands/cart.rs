//! Cart commands. Lines are addressed by their 1-based position in `cart show`.

use std::io::Write;

use bazaar_core::PaymentMethod;
use bazaar_storefront::{CartLine, LineOptions};
use tokio::io::AsyncBufRead;

use super::{CartAction, CommandError};
use crate::render;
use crate::shell::Shell;

impl<R: AsyncBufRead + Unpin, W: Write> Shell<R, W> {
    fn cart_line_at(&self, index: usize) -> Result<CartLine, CommandError> {
        index
            .checked_sub(1)
            .and_then(|i| self.storefront.cart().lines().into_iter().nth(i))
            .ok_or_else(|| CommandError::Usage(format!("There is no line {index} in your cart.")))
    }

    pub(super) async fn cart(&mut self, action: CartAction) -> Result<(), CommandError> {
        let cart = self.storefront.cart().clone();
        match action {
            CartAction::Show { payment } => return self.show_cart(payment),
            CartAction::Add {
                product,
                qty,
                size,
                color,
            } => {
                let product = self.storefront.api().product(&product).await?;
                if product.is_out_of_stock() {
                    return Err(CommandError::Usage(format!(
                        "{} is out of stock.",
                        product.name
                    )));
                }
                if !size.is_empty() && !product.sizes.is_empty() && !product.sizes.contains(&size) {
                    return Err(CommandError::Usage(format!(
                        "Size {size} is not available. Choose one of: {}",
                        product.sizes.join(", ")
                    )));
                }
                self.storefront
                    .add_to_cart(&product.snapshot(), qty, LineOptions::new(size, color))?;
                self.say(format!("Added {qty} x {} to your cart.", product.name))?;
            }
            CartAction::Set { line, quantity } => {
                let line = self.cart_line_at(line)?;
                cart.update_quantity(line.id, quantity);
            }
            CartAction::Inc { line } => cart.increment(self.cart_line_at(line)?.id),
            CartAction::Dec { line } => cart.decrement(self.cart_line_at(line)?.id),
            CartAction::Remove { line } => {
                let line = self.cart_line_at(line)?;
                cart.remove_item(line.id);
                self.say(format!("Removed {}.", line.product.name))?;
            }
            CartAction::Validate => {
                let validation = cart.validate();
                if validation.is_valid {
                    return self.say("Your cart is ready for checkout.");
                }
                for issue in &validation.errors {
                    self.say(format!("  {issue}"))?;
                }
                return Ok(());
            }
            CartAction::Clear => {
                cart.clear();
                return self.say("Your cart is empty.");
            }
        }
        self.show_cart(PaymentMethod::Cod)
    }

    fn show_cart(&mut self, payment: PaymentMethod) -> Result<(), CommandError> {
        let cart = self.storefront.cart().clone();
        let lines = cart.lines();
        if lines.is_empty() {
            return self.say("Your cart is empty.");
        }

        for (i, line) in lines.iter().enumerate() {
            self.say(render::cart_line(i + 1, line))?;
        }
        self.say(format!("{} item(s)", cart.item_count()))?;
        for row in render::totals(&cart.totals(payment)) {
            self.say(row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::shell::tests::{offline_storefront, run_script};

    #[tokio::test]
    async fn test_empty_cart() {
        let output = run_script(offline_storefront(), "cart\n").await;
        assert!(output.contains("Your cart is empty."));
    }

    #[tokio::test]
    async fn test_unknown_line() {
        let output = run_script(offline_storefront(), "cart remove 1\ncart inc 0\n").await;
        assert!(output.contains("There is no line 1 in your cart."));
        assert!(output.contains("There is no line 0 in your cart."));
    }
}
