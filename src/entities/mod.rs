pub mod address;
pub mod discount_code;
pub mod order;
pub mod product;
pub mod user;

pub use address::{Entity as Address, Model as AddressModel};
pub use discount_code::{DiscountKind, Entity as DiscountCode, Model as DiscountCodeModel};
pub use order::{Entity as Order, Model as OrderModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use user::{Entity as User, Model as UserModel};
