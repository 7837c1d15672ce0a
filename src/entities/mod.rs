//! SeaORM entities owned by the order engine.

pub mod address;
pub mod cart;
pub mod cart_item;
pub mod identity;
pub mod order;
pub mod order_line;
pub mod payment;
pub mod product_variant;

// Re-export entities
pub use address::{Entity as Address, Model as AddressModel};
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use identity::{Entity as Identity, Model as IdentityModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod, ShippingMethod};
pub use order_line::{Entity as OrderLine, Model as OrderLineModel};
pub use payment::{Entity as Payment, Model as PaymentModel};
pub use product_variant::{Entity as ProductVariant, Model as ProductVariantModel};
