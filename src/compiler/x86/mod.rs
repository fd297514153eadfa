/*!
 # x86
 ## About
 This module models the subset of the x86-64 assembly language that the
 code generator emits: the integer instructions working on `rax`, `rcx`
 and `rdx`, the frame instructions working on `rbp` and `rsp`, and the x87
 floating point stack instructions used for `real` arithmetic.

 Each [`assembly::Inst`] formats itself as one line of Intel syntax
 assembly, so the generator never writes raw text.
 */
pub mod assembly;
