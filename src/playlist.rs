use crate::error::{AudioError, Result};
use crate::track::Track;

/// Playlist ordenada con cursor envolvente.
///
/// El cursor envuelve módulo la longitud en ambas direcciones: retroceder
/// desde 0 va a la última pista y avanzar desde la última vuelve a 0. Se
/// permiten duplicados (la misma ubicación puede aparecer dos veces como
/// entradas distintas). Con la playlist vacía no hay pista actual.
#[derive(Debug, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
    index: usize,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega una pista al final.
    pub fn add(&mut self, track: Track, max_size: usize) -> Result<()> {
        if self.tracks.len() >= max_size {
            return Err(AudioError::PlaylistFull { max: max_size });
        }

        self.tracks.push(track);
        Ok(())
    }

    /// Elimina la pista en `index` y devuelve su dueña.
    ///
    /// El cursor se reencaja en rango en vez de quedar colgando fuera de la
    /// lista acortada.
    pub fn remove(&mut self, index: usize) -> Result<Track> {
        if index >= self.tracks.len() {
            return Err(AudioError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            });
        }

        let removed = self.tracks.remove(index);

        if self.tracks.is_empty() {
            self.index = 0;
        } else if self.index >= self.tracks.len() {
            self.index = self.tracks.len() - 1;
        }

        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.index = 0;
    }

    /// Avanza el cursor una posición, envolviendo al llegar al final.
    pub fn advance(&mut self) {
        if self.tracks.is_empty() {
            self.index = 0;
        } else if self.index + 1 >= self.tracks.len() {
            self.index = 0;
        } else {
            self.index += 1;
        }
    }

    /// Retrocede el cursor una posición, envolviendo por debajo de 0.
    pub fn retreat(&mut self) {
        if self.tracks.is_empty() {
            self.index = 0;
        } else if self.index == 0 {
            self.index = self.tracks.len() - 1;
        } else {
            self.index -= 1;
        }
    }

    /// Salta a un índice explícito; fuera de rango envuelve a 0.
    pub fn jump(&mut self, index: usize) {
        if index >= self.tracks.len() {
            self.index = 0;
        } else {
            self.index = index;
        }
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.index)
    }

    pub fn current_mut(&mut self) -> Option<&mut Track> {
        self.tracks.get_mut(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Fuerza un cursor arbitrario, incluso fuera de rango.
    ///
    /// Solo para provocar el fallo de consistencia interna en tests; el
    /// camino de auto-reparación lo corrige a 0.
    #[cfg(test)]
    pub(crate) fn force_index(&mut self, index: usize) {
        self.index = index;
    }
}
