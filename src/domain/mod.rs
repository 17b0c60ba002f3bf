// Domain 層：資料模型與 ports (能力 trait)
// 儀器、操作員與儲存的實作放在 adapters/ 與 config/

pub mod model;
pub mod ports;
