pub mod wake_cycle;
