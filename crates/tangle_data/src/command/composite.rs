//! Ordered groups of relation commands.

use tangle_foundation::{Error, Result};
use tracing::{debug, trace};

use super::RelationCommand;
use crate::data_manager::{DataContext, DataManager};
use crate::listener::TransactionListener;

/// An ordered list of commands executed as one unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositeCommand {
    commands: Vec<RelationCommand>,
    expanded: bool,
}

impl CompositeCommand {
    /// Creates an unexpanded composite from user-level commands.
    #[must_use]
    pub fn new(commands: Vec<RelationCommand>) -> Self {
        Self {
            commands,
            expanded: false,
        }
    }

    pub(crate) fn expanded(commands: Vec<RelationCommand>) -> Self {
        Self {
            commands,
            expanded: true,
        }
    }

    /// Returns the commands in execution order.
    #[must_use]
    pub fn commands(&self) -> &[RelationCommand] {
        &self.commands
    }

    /// Returns the number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if there are no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns true if the composite is the result of an expansion.
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Expands every member and concatenates the closures.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if the composite is already expanded, and
    /// propagates loading and validation errors.
    pub fn expand_to_all_related_objects(
        self,
        data: &mut DataManager,
        ctx: &mut DataContext<'_>,
    ) -> Result<Self> {
        if self.expanded {
            return Err(Error::protocol_violation(
                "composite command is already expanded",
            ));
        }
        let mut commands = Vec::new();
        for command in self.commands {
            commands.extend(command.expand_to_all_related_objects(data, ctx)?.commands);
        }
        Ok(Self::expanded(commands))
    }

    /// Runs `begin` on all commands, then `perform` on all, then `end` on all.
    ///
    /// Nothing is performed if any `begin` fails.
    ///
    /// # Errors
    ///
    /// Propagates the first `begin` or `perform` error. A `perform` error
    /// leaves earlier commands applied; the caller is expected to roll back.
    pub fn execute(
        &self,
        data: &mut DataManager,
        listener: &mut dyn TransactionListener,
    ) -> Result<()> {
        let tx = data.transaction();
        debug!(%tx, steps = self.commands.len(), "executing relation commands");

        for command in &self.commands {
            if let Err(err) = command.begin(tx, listener) {
                debug!(%tx, kind = command.kind(), object = %command.object(), error = %err, "command vetoed");
                return Err(err.in_transaction(tx));
            }
        }
        for command in &self.commands {
            trace!(%tx, kind = command.kind(), object = %command.object(), "perform");
            command.perform(data).map_err(|err| err.in_transaction(tx))?;
        }
        for command in &self.commands {
            command.end(tx, listener);
        }
        Ok(())
    }
}

impl IntoIterator for CompositeCommand {
    type Item = RelationCommand;
    type IntoIter = std::vec::IntoIter<RelationCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}
