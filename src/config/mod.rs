pub mod simulator;

pub use simulator::SimulatorConfig;
