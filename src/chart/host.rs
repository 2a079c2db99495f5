/// Owner of at most one live chart instance.
///
/// Mounting always tears down the previous instance first, so a data
/// refresh never leaves two charts alive for the same panel.
#[derive(Debug)]
pub struct ChartHost<C> {
    instance: Option<C>,
    mounts: u64,
    teardowns: u64,
}

impl<C> Default for ChartHost<C> {
    fn default() -> Self {
        Self {
            instance: None,
            mounts: 0,
            teardowns: 0,
        }
    }
}

impl<C> ChartHost<C> {
    pub fn mount(&mut self, chart: C) {
        self.unmount();
        self.instance = Some(chart);
        self.mounts += 1;
    }

    pub fn unmount(&mut self) {
        if self.instance.take().is_some() {
            self.teardowns += 1;
        }
    }

    pub fn get(&self) -> Option<&C> {
        self.instance.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut C> {
        self.instance.as_mut()
    }

    pub fn is_mounted(&self) -> bool {
        self.instance.is_some()
    }

    /// Instances currently alive: 0 or 1.
    pub fn live(&self) -> u64 {
        self.mounts - self.teardowns
    }
}
