//! Shell commands.
//!
//! # Commands
//!
//! - `products`, `product`, `search`, `categories`, `reviews`, `review` - catalog
//! - `cart` - view and edit the cart
//! - `login`, `register`, `verify`, `resend-otp`, `forgot-password`, `logout`, `whoami` - session
//! - `address`, `wishlist`, `orders` - account data
//! - `checkout`, `pay` - order placement and payment
//! - `notifications` - in-app notification log

use std::io::{self, Write};

use bazaar_core::{AddressId, OrderId, PaymentMethod, ProductId};
use bazaar_storefront::models::ProductSort;
use bazaar_storefront::{
    AccountError, ApiError, CartError, CheckoutError, FieldErrors, StorefrontError,
};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::io::AsyncBufRead;

use crate::shell::Shell;

mod account;
mod cart;
mod catalog;
mod checkout;
mod notifications;

/// Errors surfaced to the shell.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    /// The command was understood but cannot run in the current state.
    #[error("{0}")]
    Usage(String),

    /// Input ended while prompting.
    #[error("input closed")]
    Aborted,

    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl CommandError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Storefront(err) => err.user_message(),
            Self::Usage(message) => message.clone(),
            Self::Aborted => "Cancelled.".to_string(),
            Self::Io(err) => err.to_string(),
        }
    }

    pub fn is_reportable(&self) -> bool {
        match self {
            Self::Storefront(err) => err.is_reportable(),
            Self::Io(_) => true,
            Self::Usage(_) | Self::Aborted => false,
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Storefront(StorefrontError::Account(err)) => err.field_errors(),
            Self::Storefront(StorefrontError::Api(err)) => err.field_errors(),
            _ => None,
        }
    }
}

impl From<ApiError> for CommandError {
    fn from(err: ApiError) -> Self {
        Self::Storefront(err.into())
    }
}

impl From<CartError> for CommandError {
    fn from(err: CartError) -> Self {
        Self::Storefront(err.into())
    }
}

impl From<AccountError> for CommandError {
    fn from(err: AccountError) -> Self {
        Self::Storefront(err.into())
    }
}

impl From<CheckoutError> for CommandError {
    fn from(err: CheckoutError) -> Self {
        Self::Storefront(err.into())
    }
}

/// What the shell does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// One shell line.
#[derive(Parser)]
#[command(name = "bazaar", no_binary_name = true, disable_version_flag = true)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List products
    Products {
        /// Page number
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Products per page
        #[arg(long)]
        limit: Option<u32>,
        /// Category name or slug
        #[arg(long)]
        category: Option<String>,
        /// `newest`, `price_asc`, `price_desc`, `rating` or `popular`
        #[arg(long)]
        sort: Option<ProductSort>,
        /// Lowest price
        #[arg(long)]
        min: Option<Decimal>,
        /// Highest price
        #[arg(long)]
        max: Option<Decimal>,
    },
    /// Show one product
    Product { id: ProductId },
    /// Search products by name
    Search {
        #[arg(required = true, num_args = 1..)]
        terms: Vec<String>,
    },
    /// List categories
    Categories,
    /// Show a product's reviews
    Reviews {
        product: ProductId,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Review a product
    Review {
        product: ProductId,
        /// 1 to 5 stars
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        comment: String,
    },
    /// View and edit the cart
    Cart {
        #[command(subcommand)]
        action: Option<CartAction>,
    },
    /// Sign in (prompts for the password)
    Login { email: String },
    /// Create an account (prompts for the password)
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
    },
    /// Confirm a registration with the emailed code
    Verify { otp: String },
    /// Email a new registration code
    ResendOtp,
    /// Request a password reset email
    ForgotPassword { email: String },
    /// Set a new password from a reset token (prompts for the password)
    ResetPassword { token: String },
    /// Sign out and clear the cart
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage the address book
    Address {
        #[command(subcommand)]
        action: Option<AddressAction>,
    },
    /// View and edit the wishlist
    Wishlist {
        #[command(subcommand)]
        action: Option<WishlistAction>,
    },
    /// Order history
    Orders {
        #[command(subcommand)]
        action: Option<OrderAction>,
    },
    /// Place an order for the cart
    Checkout {
        /// Address ID (defaults to the default address)
        #[arg(long)]
        address: Option<AddressId>,
        /// `cod` or `online`
        #[arg(long, default_value = "cod")]
        payment: PaymentMethod,
    },
    /// Report the payment widget's result for the pending online order
    Pay {
        #[command(subcommand)]
        result: PayResult,
    },
    /// In-app notifications
    Notifications {
        #[command(subcommand)]
        action: Option<NotificationAction>,
    },
    /// Leave the shell
    #[command(alias = "quit")]
    Exit,
}

#[derive(Subcommand)]
pub enum CartAction {
    /// Show cart lines and totals
    Show {
        /// Price the cart for this payment method
        #[arg(long, default_value = "cod")]
        payment: PaymentMethod,
    },
    /// Add a product
    Add {
        product: ProductId,
        #[arg(long, default_value_t = 1)]
        qty: u32,
        #[arg(long, default_value = "")]
        size: String,
        #[arg(long, default_value = "")]
        color: String,
    },
    /// Set a line's quantity (0 removes it)
    Set {
        /// Line number from `cart show`
        line: usize,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Add one to a line
    Inc { line: usize },
    /// Take one from a line
    Dec { line: usize },
    /// Remove a line
    Remove { line: usize },
    /// Check lines against stock
    Validate,
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
pub enum AddressAction {
    /// List saved addresses
    List,
    /// Save a new address
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        line1: String,
        #[arg(long)]
        line2: Option<String>,
        #[arg(long)]
        landmark: Option<String>,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        pincode: String,
        /// Make this the default address
        #[arg(long)]
        default: bool,
    },
    /// Make an address the default
    Default { id: AddressId },
    /// Delete an address
    Delete { id: AddressId },
}

#[derive(Subcommand)]
pub enum WishlistAction {
    /// List wishlisted products
    List,
    /// Add or remove a product
    Toggle { product: ProductId },
}

#[derive(Subcommand)]
pub enum OrderAction {
    /// List orders
    List,
    /// Show one order
    Show { id: OrderId },
    /// Retry payment for an unpaid online order
    Pay { id: OrderId },
}

#[derive(Subcommand)]
pub enum PayResult {
    /// The widget reported success
    Success {
        #[arg(long)]
        payment_id: String,
        #[arg(long)]
        signature: String,
    },
    /// The widget reported a failure
    Fail {
        #[arg(long, default_value = "payment declined")]
        reason: String,
    },
    /// The widget was closed
    Cancel,
}

#[derive(Subcommand)]
pub enum NotificationAction {
    /// List notifications, newest first
    List,
    /// Mark one notification read
    Read { id: String },
    /// Mark every notification read
    ReadAll,
    /// Delete one notification
    Remove { id: String },
    /// Delete every notification
    Clear,
}

impl<R: AsyncBufRead + Unpin, W: Write> Shell<R, W> {
    pub(crate) async fn dispatch(&mut self, command: Command) -> Result<Flow, CommandError> {
        match command {
            Command::Products {
                page,
                limit,
                category,
                sort,
                min,
                max,
            } => {
                self.products(page, limit, category, sort, min, max)
                    .await?;
            }
            Command::Product { id } => self.product(&id).await?,
            Command::Search { terms } => self.search(&terms.join(" ")).await?,
            Command::Categories => self.categories().await?,
            Command::Reviews { product, page } => self.reviews(&product, page).await?,
            Command::Review {
                product,
                rating,
                title,
                comment,
            } => self.review(product, rating, title, comment).await?,
            Command::Cart { action } => {
                self.cart(action.unwrap_or(CartAction::Show {
                    payment: PaymentMethod::Cod,
                }))
                .await?;
            }
            Command::Login { email } => self.login(&email).await?,
            Command::Register { name, email, phone } => {
                self.register(name, email, phone).await?;
            }
            Command::Verify { otp } => self.verify(&otp).await?,
            Command::ResendOtp => self.resend_otp().await?,
            Command::ForgotPassword { email } => self.forgot_password(&email).await?,
            Command::ResetPassword { token } => self.reset_password(&token).await?,
            Command::Logout => self.logout().await?,
            Command::Whoami => self.whoami()?,
            Command::Address { action } => {
                self.address(action.unwrap_or(AddressAction::List)).await?;
            }
            Command::Wishlist { action } => {
                self.wishlist(action.unwrap_or(WishlistAction::List))
                    .await?;
            }
            Command::Orders { action } => {
                self.orders(action.unwrap_or(OrderAction::List)).await?;
            }
            Command::Checkout { address, payment } => self.checkout(address, payment).await?,
            Command::Pay { result } => self.pay(result).await?,
            Command::Notifications { action } => {
                self.notifications(action.unwrap_or(NotificationAction::List))?;
            }
            Command::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        CommandLine::try_parse_from(line.split_whitespace())
            .unwrap()
            .command
    }

    #[test]
    fn test_parse_products_filters() {
        let Command::Products {
            page,
            sort,
            min,
            category,
            ..
        } = parse("products --page 2 --sort price_asc --min 499.50 --category shirts")
        else {
            panic!("expected products");
        };
        assert_eq!(page, 2);
        assert_eq!(sort, Some(ProductSort::PriceAsc));
        assert_eq!(min, Some(Decimal::new(49950, 2)));
        assert_eq!(category.as_deref(), Some("shirts"));
    }

    #[test]
    fn test_parse_cart_set_negative() {
        let Command::Cart {
            action: Some(CartAction::Set { line, quantity }),
        } = parse("cart set 1 -3")
        else {
            panic!("expected cart set");
        };
        assert_eq!((line, quantity), (1, -3));
    }

    #[test]
    fn test_parse_checkout_defaults() {
        let Command::Checkout { address, payment } = parse("checkout") else {
            panic!("expected checkout");
        };
        assert!(address.is_none());
        assert_eq!(payment, PaymentMethod::Cod);

        assert!(CommandLine::try_parse_from(["checkout", "--payment", "card"]).is_err());
    }

    #[test]
    fn test_quit_is_exit() {
        assert!(matches!(parse("quit"), Command::Exit));
    }
}
