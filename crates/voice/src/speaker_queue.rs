//! Sprecherverwaltung fuer Broadcast-Raeume
//!
//! Reine Zustandsuebergaenge auf `&mut VoiceRoom`; der Aufrufer haelt den
//! Entry-Lock der Registry und verschickt nach Erfolg die Events. FIFO
//! gilt fuer die Warteschlangen-ORDNUNG, nicht fuer die Genehmigung: die
//! Moderation darf in beliebiger Reihenfolge genehmigen.

use parley_core::UserId;

use crate::error::{VoiceError, VoiceResult};
use crate::room::VoiceRoom;

/// Stellt eine Mikrofonanfrage in die Warteschlange
///
/// Gibt die 1-basierte Position in der Warteschlange zurueck.
pub fn mikro_anfordern(raum: &mut VoiceRoom, user_id: UserId) -> VoiceResult<usize> {
    if !raum.broadcast {
        return Err(VoiceError::KeinBroadcastRaum);
    }
    if raum.sprecher.contains(&user_id) {
        return Err(VoiceError::BereitsSprecher);
    }
    if raum.mikro_warteschlange.contains(&user_id) {
        return Err(VoiceError::BereitsInWarteschlange);
    }

    raum.mikro_warteschlange.push(user_id);
    Ok(raum.mikro_warteschlange.len())
}

/// Genehmigt eine wartende Anfrage und befoerdert den Benutzer zum Sprecher
///
/// `genehmiger` muss Host oder moderierend sein; das Sprecherlimit wird
/// beim Genehmigen durchgesetzt, nicht beim Anfordern.
pub fn genehmigen(
    raum: &mut VoiceRoom,
    ziel: UserId,
    genehmiger: UserId,
    max_sprecher: usize,
) -> VoiceResult<()> {
    moderation_pruefen(raum, genehmiger)?;

    let position = raum
        .mikro_warteschlange
        .iter()
        .position(|id| *id == ziel)
        .ok_or(VoiceError::NichtInWarteschlange(ziel))?;

    if raum.sprecher.len() >= max_sprecher {
        return Err(VoiceError::SprecherlimitErreicht(max_sprecher));
    }

    raum.mikro_warteschlange.remove(position);
    raum.sprecher.push(ziel);
    Ok(())
}

/// Lehnt eine wartende Anfrage ab
///
/// Idempotent: ein bereits verschwundener Eintrag (Race mit einem Leave
/// oder einer parallelen Entscheidung) ist kein Fehler.
pub fn ablehnen(raum: &mut VoiceRoom, ziel: UserId, ablehner: UserId) -> VoiceResult<bool> {
    moderation_pruefen(raum, ablehner)?;

    let vorher = raum.mikro_warteschlange.len();
    raum.mikro_warteschlange.retain(|id| *id != ziel);
    Ok(raum.mikro_warteschlange.len() != vorher)
}

/// Entfernt einen Benutzer aus der Sprecherliste
///
/// Selbstentfernung ist immer erlaubt; fremde Sprecher entfernt nur die
/// Moderation. Idempotent wie `ablehnen`.
pub fn sprecher_entfernen(raum: &mut VoiceRoom, ziel: UserId, akteur: UserId) -> VoiceResult<bool> {
    if ziel != akteur {
        moderation_pruefen(raum, akteur)?;
    } else if !raum.broadcast {
        return Err(VoiceError::KeinBroadcastRaum);
    }

    let vorher = raum.sprecher.len();
    raum.sprecher.retain(|id| *id != ziel);
    Ok(raum.sprecher.len() != vorher)
}

fn moderation_pruefen(raum: &VoiceRoom, akteur: UserId) -> VoiceResult<()> {
    if !raum.broadcast {
        return Err(VoiceError::KeinBroadcastRaum);
    }
    let teilnehmer = raum.teilnehmer_finden(akteur).ok_or(VoiceError::NichtImRaum)?;
    if !raum.kann_moderieren(teilnehmer) {
        return Err(VoiceError::NichtBerechtigt);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
