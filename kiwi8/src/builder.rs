use crate::config::Config;
use crate::context::Context;
use crate::error::Error;
use crate::kiwi::Kiwi8;

pub struct Builder<'a, C: Context> {
    context: Option<C>,
    program: Option<&'a [u8]>,
    config: Config,
}

impl<'a, C: Context> Builder<'a, C> {
    pub fn new() -> Self {
        Self {
            context: None,
            program: None,
            config: Config::default(),
        }
    }

    pub fn with_context(mut self, ctx: C) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Program to load right away, can also be loaded on the built machine
    pub fn with_program(mut self, prog: &'a [u8]) -> Self {
        self.program = Some(prog);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Kiwi8<C>, Error> {
        let context = self.context.ok_or(Error::MissingContext)?;
        let mut kiwi = Kiwi8::with_config(context, self.config);
        if let Some(program) = self.program {
            kiwi.load_program(program)?;
        }
        Ok(kiwi)
    }
}

impl<'a, C: Context> Default for Builder<'a, C> {
    fn default() -> Self {
        Self::new()
    }
}
