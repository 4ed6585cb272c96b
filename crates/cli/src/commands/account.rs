//! Session and account commands.

use std::io::Write;

use bazaar_storefront::models::{AddressDetails, AddressInput, Registration};
use secrecy::SecretString;
use tokio::io::AsyncBufRead;

use super::{AddressAction, CommandError, OrderAction, WishlistAction};
use crate::render;
use crate::shell::Shell;

impl<R: AsyncBufRead + Unpin, W: Write> Shell<R, W> {
    async fn ask_password(&mut self, prompt: &str) -> Result<SecretString, CommandError> {
        Ok(SecretString::from(self.ask(prompt).await?))
    }

    fn require_signed_in(&self) -> Result<(), CommandError> {
        if self.storefront.account().is_authenticated() {
            Ok(())
        } else {
            Err(CommandError::Usage(
                "Please log in first: login <email>".to_string(),
            ))
        }
    }

    pub(super) async fn login(&mut self, email: &str) -> Result<(), CommandError> {
        let password = self.ask_password("Password: ").await?;
        let user = self.storefront.account().login(email, &password).await?;
        self.say(format!("Welcome back, {}!", user.name))
    }

    pub(super) async fn register(
        &mut self,
        name: String,
        email: String,
        phone: String,
    ) -> Result<(), CommandError> {
        let password = self.ask_password("Choose a password: ").await?;
        let registration = Registration {
            name,
            email,
            phone,
            password,
        };
        let pending = self.storefront.account().register(&registration).await?;
        self.say(format!(
            "We sent a code to {}. Finish with: verify <code>",
            pending.email
        ))?;
        self.pending_verification = Some(pending);
        Ok(())
    }

    pub(super) async fn verify(&mut self, otp: &str) -> Result<(), CommandError> {
        let pending = self.pending_verification.clone().ok_or_else(|| {
            CommandError::Usage("There is no registration waiting for a code.".to_string())
        })?;
        let user = self.storefront.account().verify_otp(&pending, otp).await?;
        self.pending_verification = None;
        self.storefront
            .notifications()
            .account_notification("Welcome to Bazaar", "Your account is ready.");
        self.say(format!("Account verified. Welcome, {}!", user.name))
    }

    pub(super) async fn resend_otp(&mut self) -> Result<(), CommandError> {
        let pending = self.pending_verification.clone().ok_or_else(|| {
            CommandError::Usage("There is no registration waiting for a code.".to_string())
        })?;
        self.storefront.account().resend_otp(&pending).await?;
        self.say(format!("A new code was sent to {}.", pending.email))
    }

    pub(super) async fn forgot_password(&mut self, email: &str) -> Result<(), CommandError> {
        self.storefront.account().forgot_password(email).await?;
        self.say("If that email has an account, a reset link is on its way.")
    }

    pub(super) async fn reset_password(&mut self, token: &str) -> Result<(), CommandError> {
        let password = self.ask_password("New password: ").await?;
        self.storefront
            .account()
            .reset_password(token, &password)
            .await?;
        self.say("Password updated. You can log in now.")
    }

    pub(super) async fn logout(&mut self) -> Result<(), CommandError> {
        self.storefront.logout().await;
        self.pending_payment = None;
        self.say("Signed out.")
    }

    pub(super) fn whoami(&mut self) -> Result<(), CommandError> {
        match self.storefront.account().user() {
            Some(user) => self.say(format!("{} <{}>", user.name, user.email)),
            None => self.say("Not signed in."),
        }
    }

    pub(super) async fn address(&mut self, action: AddressAction) -> Result<(), CommandError> {
        self.require_signed_in()?;
        let account = self.storefront.account().clone();

        match action {
            AddressAction::List => {}
            AddressAction::Add {
                name,
                phone,
                line1,
                line2,
                landmark,
                city,
                state,
                pincode,
                default,
            } => {
                let address = account
                    .add_address(AddressInput {
                        details: AddressDetails {
                            name,
                            phone,
                            line1,
                            line2,
                            landmark,
                            city,
                            state,
                            pincode,
                        },
                        is_default: default,
                    })
                    .await?;
                self.say(format!("Saved address {}.", address.id))?;
            }
            AddressAction::Default { id } => {
                account.set_default_address(&id).await?;
            }
            AddressAction::Delete { id } => {
                account.delete_address(&id).await?;
                self.say("Address deleted.")?;
            }
        }

        let addresses = account.addresses();
        if addresses.is_empty() {
            return self.say("No saved addresses.");
        }
        for address in &addresses {
            self.say(render::address_row(address))?;
        }
        Ok(())
    }

    pub(super) async fn wishlist(&mut self, action: WishlistAction) -> Result<(), CommandError> {
        self.require_signed_in()?;
        let account = self.storefront.account().clone();

        match action {
            WishlistAction::List => {
                let wishlist = account.wishlist();
                if wishlist.is_empty() {
                    return self.say("Your wishlist is empty.");
                }
                for product in &wishlist {
                    self.say(render::product_row(product))?;
                }
                Ok(())
            }
            WishlistAction::Toggle { product } => {
                let name = match account.wishlist().into_iter().find(|p| p.id == product) {
                    Some(p) => p.name,
                    None => self.storefront.api().product(&product).await?.name,
                };
                let added = account.toggle_wishlist(&product).await?;
                self.storefront
                    .notifications()
                    .wishlist_notification(&name, added);
                if added {
                    self.say(format!("Added {name} to your wishlist."))
                } else {
                    self.say(format!("Removed {name} from your wishlist."))
                }
            }
        }
    }

    pub(super) async fn orders(&mut self, action: OrderAction) -> Result<(), CommandError> {
        self.require_signed_in()?;
        let account = self.storefront.account().clone();

        match action {
            OrderAction::List => {
                let orders = account.refresh_orders().await?;
                if orders.is_empty() {
                    return self.say("No orders yet.");
                }
                for order in &orders {
                    self.say(render::order_row(order))?;
                }
                Ok(())
            }
            OrderAction::Show { id } => {
                let order = account.order(&id).await?;
                self.say(render::order_row(&order))?;
                for item in order.items() {
                    self.say(format!(
                        "  {} x{} @ {} = {}",
                        item.name,
                        item.quantity,
                        item.price,
                        item.line_total()
                    ))?;
                }
                self.say(format!(
                    "Ship to: {}",
                    order.shipping_address().one_line()
                ))?;
                self.say(format!("Payment: {:?}", order.payment_status()))?;
                for row in render::totals(order.totals()) {
                    self.say(row)?;
                }
                Ok(())
            }
            OrderAction::Pay { id } => self.resume_payment(&id).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::shell::tests::{offline_storefront, run_script};

    #[tokio::test]
    async fn test_account_commands_need_login() {
        let output = run_script(offline_storefront(), "whoami\naddress\nwishlist\norders\n").await;
        assert!(output.contains("Not signed in."));
        assert_eq!(output.matches("Please log in first").count(), 3);
    }

    #[tokio::test]
    async fn test_login_validates_before_sending() {
        let output = run_script(offline_storefront(), "login not-an-email\nhunter22\n").await;
        assert!(output.contains("Password: "));
        assert!(output.contains("Please correct the highlighted fields."));
        assert!(output.contains("  email: "));
    }

    #[tokio::test]
    async fn test_verify_without_registration() {
        let output = run_script(offline_storefront(), "verify 123456\n").await;
        assert!(output.contains("There is no registration waiting for a code."));
    }
}
