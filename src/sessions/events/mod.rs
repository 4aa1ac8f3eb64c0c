pub mod event_handling;
