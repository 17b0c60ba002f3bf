// Adapters 層：domain ports 的具體實作
// 模擬移液器 (不接儀器) 與終端機操作介面

pub mod console;
pub mod simulated;

pub use console::{TerminalConsole, ToneCommand};
pub use simulated::{PipetteCommand, SimulatedPipette};
