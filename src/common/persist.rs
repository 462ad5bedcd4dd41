use std::path::{Path, PathBuf};

use tracing::debug;

use crate::common::error::MuswapError;
use crate::trade::TradeModel;

/// Persistence collaborator. The engine calls `persist()` synchronously after
/// every committed transition, before the event is acknowledged as processed.
pub trait TradePersister: Send + Sync {
    fn persist(&self, trade: &TradeModel) -> Result<(), MuswapError>;
}

/// One JSON file per trade, named `{trade_uuid}-{role}.json` inside the data
/// directory. Sufficient to resume the engine after a process restart by
/// re-attaching the protocol table matching the persisted role.
pub struct JsonFilePersister {
    data_path: PathBuf,
}

impl JsonFilePersister {
    pub fn new(data_dir: impl AsRef<Path>, trade: &TradeModel) -> Self {
        let file_name = format!("{}-{}.json", trade.trade_uuid(), trade.role());
        Self {
            data_path: data_dir.as_ref().join(file_name),
        }
    }

    pub fn restore(data_path: impl AsRef<Path>) -> Result<TradeModel, MuswapError> {
        let json = std::fs::read_to_string(data_path.as_ref())?;
        let trade: TradeModel = serde_json::from_str(&json)?;
        Ok(trade)
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
}

impl TradePersister for JsonFilePersister {
    fn persist(&self, trade: &TradeModel) -> Result<(), MuswapError> {
        let json = serde_json::to_string(trade)?;
        debug!(
            "Persisting Trade {} in state {} to path {}",
            trade.trade_uuid(),
            trade.state(),
            self.data_path.display()
        );
        std::fs::write(&self.data_path, json)?;
        Ok(())
    }
}
