use goniolab_common::config::StageConfig;
use std::io::{BufRead, Write};
use tracing::{debug, error, info};

/// Stage position as reported by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagePosition {
    pub steps: i32,
    pub microsteps: i32,
}

/// Rotation stage command set.
pub trait Stage {
    /// Relative move by whole steps plus microsteps.
    fn move_by(&mut self, steps: i32, microsteps: i32) -> Result<(), StageError>;

    /// Move to the home position and zero the counter.
    fn home(&mut self) -> Result<(), StageError>;

    fn position(&mut self) -> Result<StagePosition, StageError>;

    fn speed(&mut self) -> Result<u32, StageError>;

    fn set_speed(&mut self, speed: u32) -> Result<(), StageError>;

    fn close(&mut self) -> Result<(), StageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("stage device {0} failed: {1}")]
    Device(String, String),
    #[error("stage operation aborted by operator")]
    Aborted,
    #[error("stage operator I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Scoped stage handle: the stage is closed exactly once, either through
/// [`StageSession::close`] or when the session is dropped.
pub struct StageSession<S: Stage> {
    stage: S,
    device: String,
    closed: bool,
}

impl<S: Stage> StageSession<S> {
    /// Take ownership of an opened stage and apply the configured speed.
    pub fn open(stage: S, config: &StageConfig) -> Result<Self, StageError> {
        let mut session = Self {
            stage,
            device: config.device.clone(),
            closed: false,
        };
        if let Some(speed) = config.speed {
            let previous = session.stage.speed()?;
            info!(device = session.device, previous, speed, "changing stage speed");
            session.stage.set_speed(speed)?;
        }
        info!(device = session.device, "stage session opened");
        Ok(session)
    }

    pub fn stage(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Close the stage and surface the result instead of only logging it.
    pub fn close(mut self) -> Result<(), StageError> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<(), StageError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stage.close()?;
        info!(device = self.device, "stage session closed");
        Ok(())
    }
}

impl<S: Stage> Drop for StageSession<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close_inner() {
            error!(device = self.device, error = %e, "failed to close stage");
        }
    }
}

/// Operator-driven stage: each move is announced on `output` and the
/// operator confirms it on `input` once the stage has been turned.
///
/// Position is tracked from the commanded moves.
pub struct ManualStage<R: BufRead, W: Write> {
    input: R,
    output: W,
    steps_per_degree: u32,
    position: StagePosition,
    speed: u32,
}

impl<R: BufRead, W: Write> ManualStage<R, W> {
    pub fn new(input: R, output: W, steps_per_degree: u32) -> Self {
        Self {
            input,
            output,
            steps_per_degree: steps_per_degree.max(1),
            position: StagePosition::default(),
            speed: 0,
        }
    }

    fn confirm(&mut self, prompt: &str) -> Result<(), StageError> {
        write!(self.output, "{prompt} and press Enter: ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(StageError::Aborted);
        }
        if matches!(line.trim(), "q" | "quit") {
            return Err(StageError::Aborted);
        }
        Ok(())
    }

    fn degrees(&self, steps: i32) -> f64 {
        steps as f64 / self.steps_per_degree as f64
    }
}

impl<R: BufRead, W: Write> Stage for ManualStage<R, W> {
    fn move_by(&mut self, steps: i32, microsteps: i32) -> Result<(), StageError> {
        let prompt = format!(
            "Rotate the stage by {:+} degrees ({steps} steps, {microsteps} microsteps)",
            self.degrees(steps)
        );
        self.confirm(&prompt)?;
        self.position.steps += steps;
        self.position.microsteps += microsteps;
        debug!(
            steps = self.position.steps,
            microsteps = self.position.microsteps,
            "manual move confirmed"
        );
        Ok(())
    }

    fn home(&mut self) -> Result<(), StageError> {
        self.confirm("Return the stage to its home position")?;
        self.position = StagePosition::default();
        Ok(())
    }

    fn position(&mut self) -> Result<StagePosition, StageError> {
        Ok(self.position)
    }

    fn speed(&mut self) -> Result<u32, StageError> {
        Ok(self.speed)
    }

    fn set_speed(&mut self, speed: u32) -> Result<(), StageError> {
        self.speed = speed;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StageError> {
        writeln!(self.output, "Stage released.")?;
        Ok(())
    }
}
