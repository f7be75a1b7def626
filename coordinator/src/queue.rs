use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use common::Task;

/// Cola FIFO de tareas pendientes de una fase.
///
/// Tiene su propio mutex, así el watchdog puede reencolar sin tomar el lock
/// del scheduler. La capacidad se reserva al crearla con el número fijo de
/// tareas de la fase, por lo que `push` nunca espera.
#[derive(Debug)]
pub struct TaskQueue {
    inner: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    // Un pánico con el lock tomado no deja la cola a medias (push/pop son
    // atómicos sobre el VecDeque), así que seguimos usándola.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Agrega al final: una tarea reencolada queda detrás de las pendientes.
    pub fn push(&self, task: Task) {
        self.lock().push_back(task);
    }

    pub fn pop(&self) -> Option<Task> {
        self.lock().pop_front()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Cuenta las tareas encoladas que cumplen `pred`.
    pub fn count_where(&self, pred: impl Fn(&Task) -> bool) -> usize {
        self.lock().iter().filter(|t| pred(t)).count()
    }

    /// Vacía la cola y devuelve lo que hubiera.
    pub fn drain(&self) -> Vec<Task> {
        self.lock().drain(..).collect()
    }
}
