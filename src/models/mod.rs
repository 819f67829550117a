//! Domain enums and value types shared by entities, services and handlers.

pub mod notification;
pub mod order;
pub mod principal;

pub use notification::{NotificationPriority, NotificationRecipient, NotificationType};
pub use order::{Actor, MainArea, OrderItem, OrderItems, OrderStatus, Timeline, TimelineEntry};
pub use principal::{AdminRole, CustomerStatus, UserType};
