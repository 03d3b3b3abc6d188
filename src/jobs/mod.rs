pub mod orders_sync;
