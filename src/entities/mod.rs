pub mod admin;
pub mod customer;
pub mod notification;
pub mod order;
pub mod sub_area;
