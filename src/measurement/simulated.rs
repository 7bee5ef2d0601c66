//! Offline provider producing plausible random figures after a fixed delay.

use std::time::Duration;

use rand::Rng;

use super::{MeasurementProvider, MeasurementRequest, ProviderError, ProviderMeta, RawMeasurement};

pub struct SimulatedProvider {
    delay: Duration,
}

impl SimulatedProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl MeasurementProvider for SimulatedProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            id: "simulated",
            display_name: "Simulated",
            description: "Random figures for development and demos; no network traffic.",
            install_hint: "built in",
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn measure(&self, _req: &MeasurementRequest) -> Result<RawMeasurement, ProviderError> {
        std::thread::sleep(self.delay);

        let mut rng = rand::thread_rng();
        Ok(RawMeasurement {
            ping_ms: rng.gen_range(4.0..60.0),
            download_bps: rng.gen_range(20.0e6..900.0e6),
            upload_bps: rng.gen_range(5.0e6..300.0e6),
            server: Some("simulated".to_string()),
        })
    }
}
